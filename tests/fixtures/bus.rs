//! Event bus that records every publication synchronously.

use std::sync::Arc;

use parking_lot::Mutex;

use autonomy_engine::notification::{EventBus, EventHandler, OrchestratorEvent, Subscription};

#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<OrchestratorEvent>>,
    subscribed: Mutex<Vec<String>>,
}

impl RecordingBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<OrchestratorEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.matches(name)).count()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: OrchestratorEvent) {
        self.events.lock().push(event);
    }

    fn subscribe(&self, name: &str, _handler: Arc<dyn EventHandler>) -> Subscription {
        self.subscribed.lock().push(name.to_string());
        Subscription::detached()
    }
}
