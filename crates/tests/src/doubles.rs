//! Test doubles for the OS device layer, the engine and the ringtone player

use soundroute_core::domain::audio::{
    DeviceEnumerationError, DeviceUid, EngineDevice, EngineDeviceId, EngineEnumerationError,
    HardwareDevice, SelectionError, SoundEngine, SubscriptionId, SystemDeviceRepository,
};
use soundroute_core::domain::engine_events::{EngineEventSource, EngineEventTarget};
use soundroute_core::domain::monitor::{DeviceTopologySource, MonitorError, TopologyCallback};
use soundroute_core::domain::preferences::{RingtoneConfiguration, RingtoneError, RingtonePlayer};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// OS device list that tests mutate directly
#[derive(Default)]
pub struct FakeDeviceRepository {
    devices: Mutex<Vec<HardwareDevice>>,
    default_input: Mutex<Option<DeviceUid>>,
    default_output: Mutex<Option<DeviceUid>>,
    failure: Mutex<Option<i32>>,
}

impl FakeDeviceRepository {
    pub fn new(devices: Vec<HardwareDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn with_defaults(self, input: &str, output: &str) -> Self {
        self.set_default_input(input);
        self.set_default_output(output);
        self
    }

    pub fn plug(&self, device: HardwareDevice) {
        self.devices.lock().unwrap().push(device);
    }

    pub fn unplug(&self, uid: &str) {
        let uid = DeviceUid::new(uid);
        self.devices.lock().unwrap().retain(|d| d.uid != uid);
    }

    pub fn set_default_input(&self, uid: &str) {
        *self.default_input.lock().unwrap() = Some(DeviceUid::new(uid));
    }

    pub fn set_default_output(&self, uid: &str) {
        *self.default_output.lock().unwrap() = Some(DeviceUid::new(uid));
    }

    /// Make every enumeration fail with the given OS status
    pub fn fail_enumeration(&self, status: i32) {
        *self.failure.lock().unwrap() = Some(status);
    }

    fn find(&self, uid: &Mutex<Option<DeviceUid>>) -> Option<HardwareDevice> {
        let uid = uid.lock().unwrap().clone()?;
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.uid == uid)
            .cloned()
    }
}

impl SystemDeviceRepository for FakeDeviceRepository {
    fn devices(&self) -> Result<Vec<HardwareDevice>, DeviceEnumerationError> {
        if let Some(status) = *self.failure.lock().unwrap() {
            return Err(DeviceEnumerationError::ListQuery { status });
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    fn default_input_device(&self) -> Option<HardwareDevice> {
        self.find(&self.default_input)
    }

    fn default_output_device(&self) -> Option<HardwareDevice> {
        self.find(&self.default_output)
    }
}

/// Engine whose device list only changes on `refresh_devices`
///
/// `stage` sets what the next refresh publishes, so tests can observe whether
/// selection ran before or after the engine re-enumerated.
#[derive(Default)]
pub struct FakeSoundEngine {
    published: Mutex<Vec<EngineDevice>>,
    staged: Mutex<Option<Vec<EngineDevice>>>,
    stopped: AtomicBool,
    rejecting: AtomicBool,
    refreshes: AtomicUsize,
    selections: Mutex<Vec<(EngineDeviceId, EngineDeviceId)>>,
    next_subscription: AtomicU64,
    targets: Mutex<Vec<(SubscriptionId, Arc<dyn EngineEventTarget>)>>,
}

impl FakeSoundEngine {
    pub fn new(devices: Vec<EngineDevice>) -> Self {
        Self {
            published: Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn stage(&self, devices: Vec<EngineDevice>) {
        *self.staged.lock().unwrap() = Some(devices);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn reject_selections(&self) {
        self.rejecting.store(true, Ordering::SeqCst);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn selections(&self) -> Vec<(EngineDeviceId, EngineDeviceId)> {
        self.selections.lock().unwrap().clone()
    }

    pub fn last_selection(&self) -> Option<(i32, i32)> {
        self.selections
            .lock()
            .unwrap()
            .last()
            .map(|(input, output)| (input.value(), output.value()))
    }

    pub fn finish_starting(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        let targets: Vec<_> = self
            .targets
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        for target in targets {
            target.engine_did_finish_starting();
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }
}

impl SoundEngine for FakeSoundEngine {
    fn devices(&self) -> Result<Vec<EngineDevice>, EngineEnumerationError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(EngineEnumerationError::NotRunning);
        }
        Ok(self.published.lock().unwrap().clone())
    }

    fn refresh_devices(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some(staged) = self.staged.lock().unwrap().take() {
            *self.published.lock().unwrap() = staged;
        }
    }

    fn select_sound_devices(
        &self,
        input: EngineDeviceId,
        output: EngineDeviceId,
    ) -> Result<(), SelectionError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SelectionError::Rejected {
                input,
                output,
                reason: "device busy".to_string(),
            });
        }
        self.selections.lock().unwrap().push((input, output));
        Ok(())
    }
}

impl EngineEventSource for FakeSoundEngine {
    fn subscribe(&self, target: Arc<dyn EngineEventTarget>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.targets.lock().unwrap().push((id, target));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.targets.lock().unwrap().retain(|(existing, _)| *existing != id);
    }
}

/// Topology source fired by hand; stands in for the OS notification thread
#[derive(Default)]
pub struct ManualTopologySource {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, TopologyCallback)>>,
}

impl ManualTopologySource {
    /// Deliver one notification from a fresh thread
    pub fn notify_from_os_thread(self: &Arc<Self>) {
        let this = self.clone();
        std::thread::spawn(move || this.notify())
            .join()
            .unwrap();
    }

    pub fn notify(&self) {
        let callbacks: Vec<_> = self
            .callbacks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }
}

impl DeviceTopologySource for ManualTopologySource {
    fn subscribe(&self, callback: TopologyCallback) -> Result<SubscriptionId, MonitorError> {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks.lock().unwrap().push((id, callback));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.callbacks.lock().unwrap().retain(|(existing, _)| *existing != id);
    }
}

#[derive(Default)]
pub struct RecordingRingtonePlayer {
    configured: Mutex<Vec<RingtoneConfiguration>>,
}

impl RecordingRingtonePlayer {
    pub fn configured(&self) -> Vec<RingtoneConfiguration> {
        self.configured.lock().unwrap().clone()
    }
}

impl RingtonePlayer for RecordingRingtonePlayer {
    fn configure(&self, configuration: &RingtoneConfiguration) -> Result<(), RingtoneError> {
        self.configured.lock().unwrap().push(configuration.clone());
        Ok(())
    }
}

/// Built-in mic and speakers plus a duplex USB headset
pub fn desk_hardware() -> Vec<HardwareDevice> {
    vec![
        HardwareDevice::new(40, "BuiltInMicDevice", "Built-in Mic").with_input(),
        HardwareDevice::new(41, "BuiltInSpeakerDevice", "Built-in Output").with_output(),
        HardwareDevice::new(57, "AppleUSBAudioEngine:Headset", "USB Headset")
            .with_input()
            .with_output(),
    ]
}

/// The engine's view of `desk_hardware`, numbered independently and in
/// a different order
pub fn desk_engine() -> Vec<EngineDevice> {
    vec![
        EngineDevice::new(0, "USB Headset").with_input().with_output(),
        EngineDevice::new(1, "Built-in Output").with_output(),
        EngineDevice::new(2, "Built-in Mic").with_input(),
    ]
}

pub fn desk_repository() -> FakeDeviceRepository {
    FakeDeviceRepository::new(desk_hardware()).with_defaults("BuiltInMicDevice", "BuiltInSpeakerDevice")
}
