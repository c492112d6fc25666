//! Device topology change source
//!
//! CPAL has no hot-plug notification API, so changes are detected by polling:
//! a background thread takes a `TopologySnapshot` at a fixed interval and
//! fires every subscribed callback when it differs from the previous one.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use soundroute_core::domain::audio::{DeviceUid, SubscriptionId, SystemDeviceRepository};
use soundroute_core::domain::monitor::{DeviceTopologySource, MonitorError, TopologyCallback};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What counts as a topology change: devices added or removed, their
/// capabilities, and the OS defaults
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologySnapshot {
    devices: Vec<(DeviceUid, String, bool, bool)>,
    default_input: Option<DeviceUid>,
    default_output: Option<DeviceUid>,
}

impl TopologySnapshot {
    pub fn capture(repository: &dyn SystemDeviceRepository) -> Option<Self> {
        let mut devices: Vec<_> = match repository.devices() {
            Ok(devices) => devices
                .into_iter()
                .map(|d| (d.uid, d.name, d.has_input, d.has_output))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Topology poll failed");
                return None;
            }
        };
        devices.sort();

        Some(Self {
            devices,
            default_input: repository.default_input_device().map(|d| d.uid),
            default_output: repository.default_output_device().map(|d| d.uid),
        })
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

type Callbacks = Arc<Mutex<BTreeMap<SubscriptionId, TopologyCallback>>>;

struct Poller {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// `DeviceTopologySource` that polls a `SystemDeviceRepository`
///
/// The polling thread runs only while at least one callback is subscribed.
pub struct PollingTopologySource {
    repository: Arc<dyn SystemDeviceRepository>,
    interval: Duration,
    callbacks: Callbacks,
    next_id: AtomicU64,
    poller: Mutex<Option<Poller>>,
}

impl PollingTopologySource {
    pub fn new(repository: Arc<dyn SystemDeviceRepository>, interval: Duration) -> Self {
        Self {
            repository,
            interval,
            callbacks: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
            poller: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn spawn_poller(&self) -> Result<Poller, MonitorError> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let repository = self.repository.clone();
        let callbacks = self.callbacks.clone();
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("soundroute-topology".to_string())
            .spawn(move || {
                let mut previous = TopologySnapshot::capture(repository.as_ref());
                debug!(
                    devices = previous.as_ref().map_or(0, TopologySnapshot::device_count),
                    "Topology polling started"
                );

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let Some(current) = TopologySnapshot::capture(repository.as_ref()) else {
                        continue;
                    };
                    if previous.as_ref() == Some(&current) {
                        continue;
                    }

                    info!(devices = current.device_count(), "Audio device topology changed");
                    previous = Some(current);

                    let subscribers: Vec<TopologyCallback> = callbacks
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .values()
                        .cloned()
                        .collect();
                    for callback in subscribers {
                        callback();
                    }
                }
                debug!("Topology polling stopped");
            })
            .map_err(|e| MonitorError::Subscribe(e.to_string()))?;

        Ok(Poller { stop_tx, handle })
    }
}

impl DeviceTopologySource for PollingTopologySource {
    fn subscribe(&self, callback: TopologyCallback) -> Result<SubscriptionId, MonitorError> {
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if poller.is_none() {
            *poller = Some(self.spawn_poller()?);
        }

        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, callback);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        // Same lock order as `subscribe`: poller, then callbacks.
        let mut guard = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        let now_empty = {
            let mut callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
            callbacks.remove(&id);
            callbacks.is_empty()
        };
        if !now_empty {
            return;
        }

        let poller = guard.take();
        drop(guard);
        if let Some(Poller { stop_tx, handle }) = poller {
            let _ = stop_tx.send(());
            // A callback unsubscribing from the polling thread cannot join itself.
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                warn!("Topology polling thread panicked");
            }
        }
    }
}

impl Drop for PollingTopologySource {
    fn drop(&mut self) {
        let poller = self.poller.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(Poller { stop_tx, handle }) = poller {
            let _ = stop_tx.send(());
            let _ = handle.join();
        }
    }
}
