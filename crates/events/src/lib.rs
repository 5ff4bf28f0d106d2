//! In-process job event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`JobEvent`]: the lifecycle event envelope.
//! - [`EventAuditLog`]: background consumer that writes every event to the
//!   structured log.

pub mod audit;
pub mod bus;

pub use audit::EventAuditLog;
pub use bus::{EventBus, JobEvent};
