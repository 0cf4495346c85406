//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! database and repositories. Nothing in this crate reads environment variables
//! while handling a request; the binary does that before constructing
//! [`CoreConfig`].

use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DATABASE_PATH, DEFAULT_POOL_SIZE};
use crate::{RecordError, RecordResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whether lab procedure updates are checked against the lifecycle transition table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any status may be written over any other.
    #[default]
    Permissive,
    /// Updates only succeed when the stored status may move to the new one.
    Enforced,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    pool_size: u32,
    connect_timeout: Duration,
    transition_policy: TransitionPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidInput` if the database path is empty, the pool size is zero
    /// or the connection timeout is zero.
    pub fn new(
        database_path: PathBuf,
        pool_size: u32,
        connect_timeout: Duration,
        transition_policy: TransitionPolicy,
    ) -> RecordResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(RecordError::InvalidInput(
                "database path cannot be empty".into(),
            ));
        }

        if pool_size == 0 {
            return Err(RecordError::InvalidInput(
                "pool size must be at least 1".into(),
            ));
        }

        if connect_timeout.is_zero() {
            return Err(RecordError::InvalidInput(
                "connection timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_path,
            pool_size,
            connect_timeout,
            transition_policy,
        })
    }

    /// Configuration for `database_path` with default pool settings and permissive transitions.
    pub fn with_database(database_path: impl Into<PathBuf>) -> RecordResult<Self> {
        Self::new(
            database_path.into(),
            DEFAULT_POOL_SIZE,
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            TransitionPolicy::Permissive,
        )
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        self.transition_policy
    }
}

/// Resolve the database path from an optional raw value.
///
/// `None` or a blank value falls back to [`DEFAULT_DATABASE_PATH`].
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
}

/// Parse a pool size from an optional raw value, defaulting when unset or blank.
///
/// # Errors
///
/// Returns `RecordError::InvalidInput` if the value is not a non-negative integer.
pub fn pool_size_from_env_value(value: Option<String>) -> RecordResult<u32> {
    parse_or_default(value, DEFAULT_POOL_SIZE, "pool size")
}

/// Parse a connection timeout in seconds, defaulting when unset or blank.
///
/// # Errors
///
/// Returns `RecordError::InvalidInput` if the value is not a non-negative integer.
pub fn connect_timeout_from_env_value(value: Option<String>) -> RecordResult<Duration> {
    parse_or_default(value, DEFAULT_CONNECT_TIMEOUT_SECS, "connection timeout")
        .map(Duration::from_secs)
}

/// Parse the transition policy from a boolean-ish flag (`true`/`1`/`yes` enforce).
///
/// # Errors
///
/// Returns `RecordError::InvalidInput` for values that are neither truthy nor falsy.
pub fn transition_policy_from_env_value(value: Option<String>) -> RecordResult<TransitionPolicy> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None | Some("false" | "0" | "no" | "off") => Ok(TransitionPolicy::Permissive),
        Some("true" | "1" | "yes" | "on") => Ok(TransitionPolicy::Enforced),
        Some(other) => Err(RecordError::InvalidInput(format!(
            "unrecognised transition enforcement flag {other:?}"
        ))),
    }
}

fn parse_or_default<T>(value: Option<String>, default: T, what: &str) -> RecordResult<T>
where
    T: std::str::FromStr,
{
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| RecordError::InvalidInput(format!("invalid {what}: {v:?}"))),
    }
}
