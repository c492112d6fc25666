//! Reconciliation cycle: catalogs → identity map → preferences → engine
//!
//! A cycle reads the OS and engine device lists, matches them, resolves the
//! user's preferred devices and pushes the resulting engine identifiers into
//! the engine. Steps before the final selection call are read-only, so a cycle
//! that fails early leaves the engine's current routing untouched.
//!
//! Cycles must not interleave against the same engine. Run them on the
//! `SerialQueue`.

use crate::domain::audio::{
    EngineDevice, HardwareDevice, ReconcileError, Role, SoundEngine, SystemDeviceRepository,
};
use crate::domain::catalog::{DeviceCatalog, EngineDeviceCatalog};
use crate::domain::identity::DeviceIdentityMap;
use crate::domain::monitor::DeviceChangeListener;
use crate::domain::selection::{PreferredSelection, SoundIo};
use crate::domain::settings::KeyValueSettings;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Fire-and-forget unit of work; failures are logged, never returned
pub trait UseCase: Send + Sync {
    fn execute(&self);
}

/// Where a cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Refreshing,
    Applying,
    Failed,
}

/// Engine devices pushed by a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSelection {
    pub input: EngineDevice,
    pub output: EngineDevice,
    /// Hardware ringtone device; applied by the ringtone path, not the engine
    pub ringtone_output: Option<HardwareDevice>,
}

/// How a cycle that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied(AppliedSelection),
    /// No engine device for `role`, even after falling back to the defaults
    Skipped { role: Role },
}

/// Receives the result of every cycle, typically forwarding it to the UI
pub trait SelectionObserver: Send + Sync {
    fn selection_did_complete(&self, outcome: &CycleOutcome);

    fn selection_did_fail(&self, error: &ReconcileError);

    /// Every `CycleState` transition, including the brief `Failed`
    fn state_did_change(&self, _state: CycleState) {}
}

/// Selects the engine's sound devices from the user's preferences
pub struct SelectionInteractor {
    repository: Arc<dyn SystemDeviceRepository>,
    engine: Arc<dyn SoundEngine>,
    settings: Arc<dyn KeyValueSettings>,
    observer: Option<Arc<dyn SelectionObserver>>,
    state: Mutex<CycleState>,
}

impl SelectionInteractor {
    pub fn new(
        repository: Arc<dyn SystemDeviceRepository>,
        engine: Arc<dyn SoundEngine>,
        settings: Arc<dyn KeyValueSettings>,
    ) -> Self {
        Self {
            repository,
            engine,
            settings,
            observer: None,
            state: Mutex::new(CycleState::Idle),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SelectionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: CycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        if let Some(observer) = &self.observer {
            observer.state_did_change(state);
        }
    }

    /// Run one cycle and return how it ended
    pub fn try_execute(&self) -> Result<CycleOutcome, ReconcileError> {
        self.set_state(CycleState::Refreshing);
        let result = self.run_cycle();
        if result.is_err() {
            self.set_state(CycleState::Failed);
        }
        self.set_state(CycleState::Idle);
        result
    }

    fn run_cycle(&self) -> Result<CycleOutcome, ReconcileError> {
        let hardware = DeviceCatalog::load(self.repository.as_ref())?;
        let engine_devices = EngineDeviceCatalog::load(self.engine.as_ref())?;
        let map = DeviceIdentityMap::build(&hardware, &engine_devices);

        let preferred = PreferredSelection::new(self.settings.as_ref()).resolve(&hardware);
        let selected = translate(&map, preferred.clone())
            .or(translate(&map, SoundIo::system_defaults(&hardware)));

        let (input, output) = match (selected.input, selected.output) {
            (Some(input), Some(output)) => (input, output),
            (None, _) => return Ok(self.skip(Role::Input, &preferred)),
            (_, None) => return Ok(self.skip(Role::Output, &preferred)),
        };

        self.set_state(CycleState::Applying);
        debug!(input = %input.id, output = %output.id, "Selecting engine sound devices");
        self.engine.select_sound_devices(input.id, output.id)?;

        info!(input = %input.name, output = %output.name, "Selected engine sound devices");
        Ok(CycleOutcome::Applied(AppliedSelection {
            input,
            output,
            ringtone_output: preferred.ringtone_output,
        }))
    }

    fn skip(&self, role: Role, preferred: &SoundIo<HardwareDevice>) -> CycleOutcome {
        warn!(
            %role,
            device = preferred.get(role).map(|d| d.name.as_str()).unwrap_or("none"),
            "No engine device for role, keeping current selection"
        );
        CycleOutcome::Skipped { role }
    }
}

/// Map each hardware slot to its engine device for that slot's role
fn translate(map: &DeviceIdentityMap, io: SoundIo<HardwareDevice>) -> SoundIo<EngineDevice> {
    io.map_with_role(|role, device| map.engine_device_for_role(&device, role).cloned())
}

impl UseCase for SelectionInteractor {
    fn execute(&self) {
        match self.try_execute() {
            Ok(outcome) => {
                if let Some(observer) = &self.observer {
                    observer.selection_did_complete(&outcome);
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not select engine sound devices");
                if let Some(observer) = &self.observer {
                    observer.selection_did_fail(&e);
                }
            }
        }
    }
}

impl DeviceChangeListener for SelectionInteractor {
    fn system_devices_did_change(&self) {
        self.execute();
    }
}

/// Tells the engine to re-enumerate; must run before selection
pub struct EngineDeviceUpdateInteractor {
    engine: Arc<dyn SoundEngine>,
}

impl EngineDeviceUpdateInteractor {
    pub fn new(engine: Arc<dyn SoundEngine>) -> Self {
        Self { engine }
    }
}

impl UseCase for EngineDeviceUpdateInteractor {
    fn execute(&self) {
        debug!("Refreshing engine device list");
        self.engine.refresh_devices();
    }
}

impl DeviceChangeListener for EngineDeviceUpdateInteractor {
    fn system_devices_did_change(&self) {
        self.execute();
    }
}

/// Forwards cycle results to the foreground context by value
pub struct ForegroundSelectionObserver {
    tx: tokio::sync::mpsc::UnboundedSender<SelectionReport>,
}

/// Cycle result as it crosses to the foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReport {
    Completed(CycleOutcome),
    Failed(String),
}

impl ForegroundSelectionObserver {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<SelectionReport>) -> Self {
        Self { tx }
    }
}

impl SelectionObserver for ForegroundSelectionObserver {
    fn selection_did_complete(&self, outcome: &CycleOutcome) {
        let _ = self.tx.send(SelectionReport::Completed(outcome.clone()));
    }

    fn selection_did_fail(&self, error: &ReconcileError) {
        let _ = self.tx.send(SelectionReport::Failed(error.to_string()));
    }
}
