//! Domain rules for background jobs: statuses and the transition table,
//! validators, listing options, retention and statistics.
//!
//! No I/O lives here; the store and API crates build on these types.

pub mod error;
pub mod job;
pub mod job_events;
pub mod listing;
pub mod model;
pub mod retention;
pub mod roles;
pub mod stats;
pub mod types;
