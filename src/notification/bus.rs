//! Per-session publish/subscribe bus.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::OrchestratorEvent;
use crate::error::Result;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Receives published events. Errors are logged by the bus and never reach
/// the publisher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &OrchestratorEvent) -> Result<()>;
}

/// Adapts a synchronous closure into an [`EventHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&OrchestratorEvent) + Send + Sync,
{
    async fn handle(&self, event: &OrchestratorEvent) -> Result<()> {
        (self.0)(event);
        Ok(())
    }
}

/// Live subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub trait EventBus: Send + Sync {
    /// Fire-and-forget.
    fn publish(&self, event: OrchestratorEvent);

    /// Subscribes `handler` to events named `name`, or to all events with `"*"`.
    fn subscribe(&self, name: &str, handler: Arc<dyn EventHandler>) -> Subscription;
}

/// Broadcast-channel bus. Every subscriber runs on its own task and each
/// event is handled on a child task, so a failing or panicking handler only
/// loses that one event. Subscribing requires a Tokio runtime.
///
/// A subscriber that falls more than `capacity` events behind skips the
/// oldest ones and logs how many it lost.
pub struct InMemoryEventBus {
    sender: Mutex<Option<broadcast::Sender<OrchestratorEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Closes the bus and waits until every subscriber has drained the
    /// events published so far.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                warn!(error = %e, "Event subscriber task failed");
            }
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: OrchestratorEvent) {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            debug!(event = event.name(), "Bus closed, dropping event");
            return;
        };
        if sender.send(event).is_err() {
            debug!("No subscribers for event");
        }
    }

    fn subscribe(&self, name: &str, handler: Arc<dyn EventHandler>) -> Subscription {
        let Some(mut receiver) = self.sender.lock().as_ref().map(|s| s.subscribe()) else {
            warn!(name, "Subscribe on closed bus ignored");
            return Subscription::detached();
        };
        let name = name.to_string();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.matches(&name) => {
                        let handler = Arc::clone(&handler);
                        let event_name = event.name();
                        let result =
                            tokio::spawn(async move { handler.handle(&event).await }).await;
                        match result {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                warn!(event = event_name, error = %e, "Event handler failed")
                            }
                            Err(e) => {
                                warn!(event = event_name, error = %e, "Event handler panicked")
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            subscriber = %name,
                            skipped = n,
                            "Event subscriber lagged, events dropped"
                        );
                        continue;
                    }
                }
            }
        });

        let abort = task.abort_handle();
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
        Subscription::new(move || abort.abort())
    }
}
