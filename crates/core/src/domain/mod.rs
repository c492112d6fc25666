//! Domain entities and business rules

pub mod audio;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine_events;
pub mod identity;
pub mod interactor;
pub mod monitor;
pub mod preferences;
pub mod selection;
pub mod settings;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    Capability, DeviceEnumerationError, DeviceUid, EngineDevice, EngineDeviceId,
    EngineEnumerationError, HardwareDevice, ReconcileError, Role, SelectionError, SoundEngine,
    SubscriptionId, SystemDeviceRepository,
};
pub use catalog::{DeviceCatalog, EngineDeviceCatalog};
pub use config::{ConfigError, ConfigManager, ConfigWatcher, FileSettings, SoundrouteConfig};
pub use dispatch::SerialQueue;
pub use engine_events::{
    EngineEventSource, EngineEventSubscription, EngineEventTarget, SelectOnEngineStart,
};
pub use identity::DeviceIdentityMap;
pub use interactor::{
    AppliedSelection, CycleOutcome, CycleState, EngineDeviceUpdateInteractor,
    ForegroundSelectionObserver, SelectionInteractor, SelectionObserver, SelectionReport, UseCase,
};
pub use monitor::{
    DeviceChangeListener, DeviceChangeMonitor, DeviceTopologySource, MonitorError,
    TopologyCallback,
};
pub use preferences::{
    AudioDeviceNames, RingtoneConfiguration, RingtoneConfigurationLoadInteractor, RingtoneError,
    RingtoneOutputUpdateInteractor, RingtonePlayer, SoundIoLoadInteractor, SoundIoLoadOutput,
    SoundPreferencesEventTarget,
};
pub use selection::{PreferredSelection, SoundIo};
pub use settings::{InMemorySettings, KeyValueSettings, SettingKey};
