//! Local stand-in for the communications engine
//!
//! `LocalSoundEngine` mirrors how a SIP user agent exposes audio devices: it
//! keeps its own numbering space over the OS devices, only knows its device
//! list while running, re-enumerates on request and validates every selection
//! against that list.

use soundroute_core::domain::audio::{
    DeviceUid, EngineDevice, EngineDeviceId, EngineEnumerationError, SelectionError, SoundEngine,
    SubscriptionId, SystemDeviceRepository,
};
use soundroute_core::domain::engine_events::{EngineEventSource, EngineEventTarget};
use soundroute_core::domain::preferences::{RingtoneConfiguration, RingtoneError, RingtonePlayer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct EngineState {
    running: bool,
    devices: Vec<EngineDevice>,
    /// Engine ids stay stable for a uid for the lifetime of the engine
    numbering: HashMap<DeviceUid, i32>,
    next_id: i32,
    selected: Option<(EngineDeviceId, EngineDeviceId)>,
}

type Targets = Vec<(SubscriptionId, Arc<dyn EngineEventTarget>)>;

pub struct LocalSoundEngine {
    repository: Arc<dyn SystemDeviceRepository>,
    expose_uids: bool,
    state: Mutex<EngineState>,
    targets: Mutex<Targets>,
    next_subscription: AtomicU64,
}

impl LocalSoundEngine {
    pub fn new(repository: Arc<dyn SystemDeviceRepository>) -> Self {
        Self {
            repository,
            expose_uids: true,
            state: Mutex::new(EngineState::default()),
            targets: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Hide hardware uids, leaving names as the only join key
    pub fn without_uids(mut self) -> Self {
        self.expose_uids = false;
        self
    }

    /// Start the engine and notify subscribed targets
    pub fn start(&self) {
        {
            let mut state = self.lock_state();
            if state.running {
                return;
            }
            state.running = true;
            self.reload(&mut state);
        }
        info!("Sound engine started");

        for target in self.targets_snapshot() {
            target.engine_did_finish_starting();
        }
    }

    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            if !state.running {
                return;
            }
            state.running = false;
            state.devices.clear();
            state.selected = None;
        }
        info!("Sound engine stopped");

        for target in self.targets_snapshot() {
            target.engine_did_finish_stopping();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// Input and output currently routed, if any
    pub fn selected(&self) -> Option<(EngineDeviceId, EngineDeviceId)> {
        self.lock_state().selected
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn targets_snapshot(&self) -> Vec<Arc<dyn EngineEventTarget>> {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }

    fn reload(&self, state: &mut EngineState) {
        let hardware = match self.repository.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Engine could not enumerate devices, keeping previous list");
                return;
            }
        };

        let mut devices = Vec::with_capacity(hardware.len());
        for device in hardware {
            let id = match state.numbering.get(&device.uid) {
                Some(id) => *id,
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.numbering.insert(device.uid.clone(), id);
                    id
                }
            };

            let mut engine_device = EngineDevice::new(id, device.name);
            engine_device.has_input = device.has_input;
            engine_device.has_output = device.has_output;
            if self.expose_uids {
                engine_device.uid = Some(device.uid);
            }
            devices.push(engine_device);
        }

        debug!(devices = devices.len(), "Engine device list refreshed");
        state.devices = devices;
    }
}

impl SoundEngine for LocalSoundEngine {
    fn devices(&self) -> Result<Vec<EngineDevice>, EngineEnumerationError> {
        let state = self.lock_state();
        if !state.running {
            return Err(EngineEnumerationError::NotRunning);
        }
        Ok(state.devices.clone())
    }

    fn refresh_devices(&self) {
        let mut state = self.lock_state();
        if state.running {
            self.reload(&mut state);
        }
    }

    fn select_sound_devices(
        &self,
        input: EngineDeviceId,
        output: EngineDeviceId,
    ) -> Result<(), SelectionError> {
        let mut state = self.lock_state();
        if !state.running {
            return Err(SelectionError::NotRunning);
        }

        let rejected = |reason: &str| SelectionError::Rejected {
            input,
            output,
            reason: reason.to_string(),
        };
        let find = |id: EngineDeviceId| state.devices.iter().find(|d| d.id == id);

        match find(input) {
            Some(device) if device.has_input => {}
            Some(_) => return Err(rejected("input device has no input channels")),
            None => return Err(rejected("unknown input device")),
        }
        match find(output) {
            Some(device) if device.has_output => {}
            Some(_) => return Err(rejected("output device has no output channels")),
            None => return Err(rejected("unknown output device")),
        }

        state.selected = Some((input, output));
        info!(%input, %output, "Engine sound devices selected");
        Ok(())
    }
}

impl EngineEventSource for LocalSoundEngine {
    fn subscribe(&self, target: Arc<dyn EngineEventTarget>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, target));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(existing, _)| *existing != id);
    }
}

/// Ringtone player that records its routing; playback is out of scope
pub struct LocalRingtonePlayer {
    repository: Arc<dyn SystemDeviceRepository>,
    configuration: Mutex<Option<RingtoneConfiguration>>,
}

impl LocalRingtonePlayer {
    pub fn new(repository: Arc<dyn SystemDeviceRepository>) -> Self {
        Self {
            repository,
            configuration: Mutex::new(None),
        }
    }

    pub fn configuration(&self) -> Option<RingtoneConfiguration> {
        self.configuration
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl RingtonePlayer for LocalRingtonePlayer {
    fn configure(&self, configuration: &RingtoneConfiguration) -> Result<(), RingtoneError> {
        let devices = self.repository.devices()?;
        let routable = devices
            .iter()
            .any(|d| d.uid == configuration.device_uid && d.has_output);
        if !routable {
            return Err(RingtoneError::Player(format!(
                "device {} is not an available output",
                configuration.device_uid
            )));
        }

        info!(
            sound = %configuration.sound_name,
            device = %configuration.device_uid,
            "Ringtone output configured"
        );
        *self.configuration.lock().unwrap_or_else(|e| e.into_inner()) = Some(configuration.clone());
        Ok(())
    }
}
