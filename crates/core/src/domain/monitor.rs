//! Hardware change monitoring and listener fan-out
//!
//! The OS delivers topology notifications on arbitrary threads. The monitor
//! re-dispatches each one onto the serial queue, where the listeners run in
//! registration order. Order matters: the engine must re-enumerate before
//! selection is recomputed.

use crate::domain::audio::SubscriptionId;
use crate::domain::dispatch::SerialQueue;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to subscribe to device changes: {0}")]
    Subscribe(String),
}

/// Callback invoked by a topology source; carries no payload
pub type TopologyCallback = Arc<dyn Fn() + Send + Sync>;

/// OS notifications for devices added, removed, or defaults changed
pub trait DeviceTopologySource: Send + Sync {
    fn subscribe(&self, callback: TopologyCallback) -> Result<SubscriptionId, MonitorError>;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Something that must react whenever the OS device topology changes
///
/// Notifications carry no payload, so listeners always re-enumerate.
pub trait DeviceChangeListener: Send + Sync {
    fn system_devices_did_change(&self);
}

/// Subscribes to topology changes and fans them out on the serial queue
pub struct DeviceChangeMonitor {
    source: Arc<dyn DeviceTopologySource>,
    listeners: Arc<[Arc<dyn DeviceChangeListener>]>,
    queue: SerialQueue,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl DeviceChangeMonitor {
    pub fn new(
        source: Arc<dyn DeviceTopologySource>,
        listeners: Vec<Arc<dyn DeviceChangeListener>>,
        queue: SerialQueue,
    ) -> Self {
        Self {
            source,
            listeners: listeners.into(),
            queue,
            subscription: Mutex::new(None),
        }
    }

    /// Start listening; does nothing if already started
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if subscription.is_some() {
            return Ok(());
        }

        let listeners = self.listeners.clone();
        let queue = self.queue.clone();
        let callback: TopologyCallback = Arc::new(move || {
            let listeners = listeners.clone();
            let enqueued = queue.dispatch(move || {
                debug!(listeners = listeners.len(), "System audio devices changed");
                for listener in listeners.iter() {
                    listener.system_devices_did_change();
                }
            });
            if !enqueued {
                warn!("Serial queue closed, dropping device change notification");
            }
        });

        let id = self.source.subscribe(callback)?;
        *subscription = Some(id);
        info!(queue = self.queue.label(), "Device change monitor started");
        Ok(())
    }

    /// Stop listening; does nothing if not started
    pub fn stop(&self) {
        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = subscription.take() {
            self.source.unsubscribe(id);
            info!("Device change monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for DeviceChangeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
