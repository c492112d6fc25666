//! Use cases behind the sound preferences surface
//!
//! The preferences surface only deals in plain names. Edits are written to the
//! settings store on the caller's (foreground) thread; anything that touches
//! the OS device list is dispatched onto the serial queue.

use crate::domain::audio::{DeviceEnumerationError, DeviceUid, SystemDeviceRepository};
use crate::domain::catalog::DeviceCatalog;
use crate::domain::dispatch::SerialQueue;
use crate::domain::interactor::UseCase;
use crate::domain::monitor::DeviceChangeListener;
use crate::domain::selection::{PreferredSelection, SoundIo};
use crate::domain::settings::{KeyValueSettings, SettingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RingtoneError {
    #[error("Ringtone sound name not found in settings")]
    SoundNameNotFound,

    #[error("No output device available for the ringtone")]
    NoOutputDevice,

    #[error(transparent)]
    DeviceEnumeration(#[from] DeviceEnumerationError),

    #[error("Ringtone player error: {0}")]
    Player(String),
}

/// Device names offered by the preferences surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDeviceNames {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl AudioDeviceNames {
    pub fn from_catalog(catalog: &DeviceCatalog) -> Self {
        Self {
            inputs: catalog.inputs().iter().map(|d| d.name.clone()).collect(),
            outputs: catalog.outputs().iter().map(|d| d.name.clone()).collect(),
        }
    }
}

/// Receives what the preferences surface should display
pub trait SoundIoLoadOutput: Send + Sync {
    fn update(&self, devices: AudioDeviceNames, sound_io: SoundIo<String>);
}

/// Loads device lists and the effective selection for display
pub struct SoundIoLoadInteractor {
    repository: Arc<dyn SystemDeviceRepository>,
    settings: Arc<dyn KeyValueSettings>,
    output: Arc<dyn SoundIoLoadOutput>,
}

impl SoundIoLoadInteractor {
    pub fn new(
        repository: Arc<dyn SystemDeviceRepository>,
        settings: Arc<dyn KeyValueSettings>,
        output: Arc<dyn SoundIoLoadOutput>,
    ) -> Self {
        Self {
            repository,
            settings,
            output,
        }
    }

    pub fn try_execute(&self) -> Result<(), DeviceEnumerationError> {
        let catalog = DeviceCatalog::load(self.repository.as_ref())?;
        let sound_io = PreferredSelection::new(self.settings.as_ref()).resolve(&catalog);
        self.output
            .update(AudioDeviceNames::from_catalog(&catalog), sound_io.names());
        Ok(())
    }
}

impl UseCase for SoundIoLoadInteractor {
    fn execute(&self) {
        if let Err(e) = self.try_execute() {
            warn!(error = %e, "Could not load sound IO for preferences");
        }
    }
}

impl DeviceChangeListener for SoundIoLoadInteractor {
    fn system_devices_did_change(&self) {
        self.execute();
    }
}

/// Stores the user's device choices; empty names leave the setting unchanged
pub struct SoundIoSaveInteractor {
    settings: Arc<dyn KeyValueSettings>,
    sound_io: SoundIo<String>,
}

impl SoundIoSaveInteractor {
    pub fn new(settings: Arc<dyn KeyValueSettings>, sound_io: SoundIo<String>) -> Self {
        Self { settings, sound_io }
    }
}

impl UseCase for SoundIoSaveInteractor {
    fn execute(&self) {
        let slots = [
            (SettingKey::SoundInput, &self.sound_io.input),
            (SettingKey::SoundOutput, &self.sound_io.output),
            (SettingKey::RingtoneOutput, &self.sound_io.ringtone_output),
        ];
        for (key, name) in slots {
            if let Some(name) = name.as_ref().filter(|n| !n.is_empty()) {
                debug!(%key, name = %name, "Saving sound device preference");
                self.settings.set(key, name.clone());
            }
        }
    }
}

/// Stores the ringtone sound name unless it is empty
pub struct RingtoneSoundNameSaveInteractor {
    settings: Arc<dyn KeyValueSettings>,
    name: String,
}

impl RingtoneSoundNameSaveInteractor {
    pub fn new(settings: Arc<dyn KeyValueSettings>, name: impl Into<String>) -> Self {
        Self {
            settings,
            name: name.into(),
        }
    }
}

impl UseCase for RingtoneSoundNameSaveInteractor {
    fn execute(&self) {
        if !self.name.is_empty() {
            self.settings.set(SettingKey::RingtoneSound, self.name.clone());
        }
    }
}

/// What the ringtone player needs: which sound, on which device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingtoneConfiguration {
    pub sound_name: String,
    pub device_uid: DeviceUid,
}

/// Plays the ringtone; owns the ringtone output routing
pub trait RingtonePlayer: Send + Sync {
    fn configure(&self, configuration: &RingtoneConfiguration) -> Result<(), RingtoneError>;
}

pub struct RingtoneConfigurationLoadInteractor {
    repository: Arc<dyn SystemDeviceRepository>,
    settings: Arc<dyn KeyValueSettings>,
}

impl RingtoneConfigurationLoadInteractor {
    pub fn new(
        repository: Arc<dyn SystemDeviceRepository>,
        settings: Arc<dyn KeyValueSettings>,
    ) -> Self {
        Self {
            repository,
            settings,
        }
    }

    pub fn load(&self) -> Result<RingtoneConfiguration, RingtoneError> {
        let sound_name = self
            .settings
            .get(SettingKey::RingtoneSound)
            .ok_or(RingtoneError::SoundNameNotFound)?;

        let catalog = DeviceCatalog::load(self.repository.as_ref())?;
        let device = PreferredSelection::new(self.settings.as_ref())
            .resolve(&catalog)
            .ringtone_output
            .ok_or(RingtoneError::NoOutputDevice)?;

        Ok(RingtoneConfiguration {
            sound_name,
            device_uid: device.uid,
        })
    }
}

/// Points the ringtone player at the currently preferred ringtone device
pub struct RingtoneOutputUpdateInteractor {
    loader: RingtoneConfigurationLoadInteractor,
    player: Arc<dyn RingtonePlayer>,
}

impl RingtoneOutputUpdateInteractor {
    pub fn new(loader: RingtoneConfigurationLoadInteractor, player: Arc<dyn RingtonePlayer>) -> Self {
        Self { loader, player }
    }

    pub fn try_execute(&self) -> Result<RingtoneConfiguration, RingtoneError> {
        let configuration = self.loader.load()?;
        self.player.configure(&configuration)?;
        debug!(
            sound = %configuration.sound_name,
            device = %configuration.device_uid,
            "Updated ringtone output"
        );
        Ok(configuration)
    }
}

impl UseCase for RingtoneOutputUpdateInteractor {
    fn execute(&self) {
        if let Err(e) = self.try_execute() {
            warn!(error = %e, "Could not update ringtone output");
        }
    }
}

impl DeviceChangeListener for RingtoneOutputUpdateInteractor {
    fn system_devices_did_change(&self) {
        self.execute();
    }
}

/// Wires preferences surface events to the use cases
pub struct SoundPreferencesEventTarget {
    repository: Arc<dyn SystemDeviceRepository>,
    settings: Arc<dyn KeyValueSettings>,
    queue: SerialQueue,
    selection: Arc<dyn UseCase>,
    ringtone_output_update: Arc<dyn UseCase>,
}

impl SoundPreferencesEventTarget {
    pub fn new(
        repository: Arc<dyn SystemDeviceRepository>,
        settings: Arc<dyn KeyValueSettings>,
        queue: SerialQueue,
        selection: Arc<dyn UseCase>,
        ringtone_output_update: Arc<dyn UseCase>,
    ) -> Self {
        Self {
            repository,
            settings,
            queue,
            selection,
            ringtone_output_update,
        }
    }

    /// Reload device lists and the current selection into `view`
    pub fn view_should_reload_data(&self, view: Arc<dyn SoundIoLoadOutput>) {
        let load = SoundIoLoadInteractor::new(self.repository.clone(), self.settings.clone(), view);
        self.dispatch(move || load.execute());
    }

    /// Persist the user's choice, then reselect engine and ringtone devices
    pub fn view_did_change_sound_io(&self, sound_io: SoundIo<String>) {
        SoundIoSaveInteractor::new(self.settings.clone(), sound_io).execute();

        let selection = self.selection.clone();
        let ringtone = self.ringtone_output_update.clone();
        self.dispatch(move || {
            selection.execute();
            ringtone.execute();
        });
    }

    pub fn view_did_change_ringtone_name(&self, name: &str) {
        RingtoneSoundNameSaveInteractor::new(self.settings.clone(), name).execute();

        let ringtone = self.ringtone_output_update.clone();
        self.dispatch(move || ringtone.execute());
    }

    fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.queue.dispatch(job) {
            warn!("Serial queue closed, dropping preferences work");
        }
    }
}
