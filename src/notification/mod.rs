//! Session event publication.
//!
//! - `OrchestratorEvent`: every lifecycle event the orchestrator emits
//! - `EventBus`: fire-and-forget publish/subscribe, `InMemoryEventBus` by default
//! - `EventLog`: JSON-lines subscriber writing one file per session

mod bus;
mod event_log;
mod events;

pub use bus::{EventBus, EventHandler, FnHandler, InMemoryEventBus, Subscription};
pub use event_log::EventLog;
pub use events::OrchestratorEvent;
