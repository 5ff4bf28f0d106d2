//! HTTP client for the jobhub API.
//!
//! - [`AuthenticatedTransport`]: attaches bearer credentials and performs
//!   one silent refresh-and-replay on HTTP 401.
//! - [`JobsClient`]: typed calls for every `/jobs` endpoint.
//! - [`ProgressMonitor`]: polls one job until it reaches a terminal state.

pub mod client;
pub mod credentials;
pub mod error;
pub mod monitor;
pub mod transport;

pub use client::{JobsClient, ListJobs};
pub use credentials::{CredentialProvider, StaticToken};
pub use error::ClientError;
pub use monitor::{JobSource, MonitorOutcome, ProgressMonitor};
pub use transport::AuthenticatedTransport;
