use std::path::PathBuf;
use std::str::FromStr;

use jobhub_core::retention::DEFAULT_RETENTION_DAYS;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the server drains
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. When unset the server runs on the in-memory store.
    pub database_url: Option<String>,
    /// Directory artifact files are written under (default: `storage/artifacts`).
    pub artifact_root: PathBuf,
    /// Age in days after which the background cleaner purges jobs.
    pub retention_days: i64,
    /// Seconds between background retention passes (default: `3600`).
    pub retention_interval_secs: u64,
    /// Purge pending/running jobs too when they are old enough.
    pub retention_include_active: bool,
    /// Running jobs with no update for this many seconds are timed out
    /// (default: `3600`).
    pub job_timeout_secs: u64,
    /// Seconds between stale-job watchdog passes (default: `60`).
    pub watchdog_interval_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `DATABASE_URL`             | unset (in-memory store)    |
    /// | `ARTIFACT_ROOT`            | `storage/artifacts`        |
    /// | `RETENTION_DAYS`           | `30`                       |
    /// | `RETENTION_INTERVAL_SECS`  | `3600`                     |
    /// | `RETENTION_INCLUDE_ACTIVE` | `false`                    |
    /// | `JOB_TIMEOUT_SECS`         | `3600`                     |
    /// | `WATCHDOG_INTERVAL_SECS`   | `60`                       |
    ///
    /// # Panics
    ///
    /// Panics on a value that does not parse, so misconfiguration fails
    /// at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let artifact_root = std::env::var("ARTIFACT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("storage/artifacts"));

        Self {
            host,
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            database_url,
            artifact_root,
            retention_days: env_or("RETENTION_DAYS", DEFAULT_RETENTION_DAYS),
            retention_interval_secs: env_or("RETENTION_INTERVAL_SECS", 3600),
            retention_include_active: env_or("RETENTION_INCLUDE_ACTIVE", false),
            job_timeout_secs: env_or("JOB_TIMEOUT_SECS", 3600),
            watchdog_interval_secs: env_or("WATCHDOG_INTERVAL_SECS", 60),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Read and parse an env var, falling back to `default` when it is unset.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} has invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        let value: u64 = env_or("JOBHUB_TEST_SURELY_UNSET_VAR", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn env_or_parses_booleans() {
        std::env::set_var("JOBHUB_TEST_BOOL_VAR", "true");
        let value: bool = env_or("JOBHUB_TEST_BOOL_VAR", false);
        assert!(value);
        std::env::remove_var("JOBHUB_TEST_BOOL_VAR");
    }
}
