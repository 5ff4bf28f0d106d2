//! Row types and store-level inputs.
//!
//! Public entities (`Job`, `JobArtifact`) live in `jobhub_core::model`;
//! the row structs here decode PostgreSQL columns and convert into them.

pub mod artifact;
pub mod job;
