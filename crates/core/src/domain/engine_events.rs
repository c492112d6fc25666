//! Engine lifecycle notifications
//!
//! Targets register explicitly and are unregistered when their
//! `EngineEventSubscription` is dropped, so a source never keeps a target
//! alive past its owner's teardown.

use crate::domain::audio::SubscriptionId;
use crate::domain::dispatch::SerialQueue;
use crate::domain::interactor::UseCase;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives engine lifecycle events
pub trait EngineEventTarget: Send + Sync {
    fn engine_did_finish_starting(&self);

    fn engine_did_finish_stopping(&self) {}
}

/// Engine side of the registration contract
pub trait EngineEventSource: Send + Sync {
    fn subscribe(&self, target: Arc<dyn EngineEventTarget>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Registration that lasts as long as this value
pub struct EngineEventSubscription {
    source: Arc<dyn EngineEventSource>,
    id: SubscriptionId,
}

impl EngineEventSubscription {
    pub fn new(source: Arc<dyn EngineEventSource>, target: Arc<dyn EngineEventTarget>) -> Self {
        let id = source.subscribe(target);
        debug!(subscription = id.value(), "Subscribed to engine events");
        Self { source, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for EngineEventSubscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
        debug!(subscription = self.id.value(), "Unsubscribed from engine events");
    }
}

/// Re-runs sound device selection once the engine is up
///
/// The engine only exposes its device list after it starts, so any selection
/// attempted earlier was skipped or failed.
pub struct SelectOnEngineStart {
    queue: SerialQueue,
    selection: Arc<dyn UseCase>,
}

impl SelectOnEngineStart {
    pub fn new(queue: SerialQueue, selection: Arc<dyn UseCase>) -> Self {
        Self { queue, selection }
    }
}

impl EngineEventTarget for SelectOnEngineStart {
    fn engine_did_finish_starting(&self) {
        let selection = self.selection.clone();
        if !self.queue.dispatch(move || selection.execute()) {
            warn!("Serial queue closed, skipping selection after engine start");
        }
    }
}
