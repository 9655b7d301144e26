//! Post-commit events.
//!
//! The settlement APIs publish an event after every committed financial change. Subscribers (e.g. the server's ticket
//! notifier) run on their own tokio tasks and can never roll back, or delay, the change that triggered them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
