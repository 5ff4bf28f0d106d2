//! Well-known role name constants carried in the `role` claim of access tokens.

/// Full access across organizations, including retention cleanup.
pub const ROLE_ADMIN: &str = "admin";
/// Regular organization member: submits, watches, cancels and retries jobs.
pub const ROLE_MEMBER: &str = "member";
/// Executor identity allowed to drive job lifecycle transitions.
pub const ROLE_WORKER: &str = "worker";
