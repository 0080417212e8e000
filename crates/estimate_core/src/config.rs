//! Runtime configuration for the reconciliation core.
//!
//! # Responsibility
//! - Carry store and retry tuning with safe defaults.
//! - Load overrides from JSON supplied by the host application.
//!
//! # Invariants
//! - `max_sequence_attempts >= 1`; a change order is always tried once.
//! - `busy_timeout_ms > 0`; concurrent writers wait instead of failing fast.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_SEQUENCE_ATTEMPTS: u32 = 5;

/// Tuning knobs for store access and change-order allocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// How long a connection waits on a locked database.
    pub busy_timeout_ms: u64,
    /// Full read-compute-write attempts before a sequence conflict is fatal.
    pub max_sequence_attempts: u32,
    /// Log level passed to `init_logging`.
    pub log_level: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_sequence_attempts: DEFAULT_MAX_SEQUENCE_ATTEMPTS,
            log_level: default_log_level().to_string(),
        }
    }
}

/// Invalid configuration input.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    ZeroSequenceAttempts,
    ZeroBusyTimeout,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid reconcile config: {err}"),
            Self::ZeroSequenceAttempts => write!(f, "max_sequence_attempts must be at least 1"),
            Self::ZeroBusyTimeout => write!(f, "busy_timeout_ms must be greater than 0"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl ReconcileConfig {
    /// Parses a JSON object; absent keys keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sequence_attempts == 0 {
            return Err(ConfigError::ZeroSequenceAttempts);
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ReconcileConfig};

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ReconcileConfig::from_json_str(r#"{"max_sequence_attempts": 9}"#)
            .expect("partial config should parse");
        assert_eq!(config.max_sequence_attempts, 9);
        assert_eq!(
            config.busy_timeout_ms,
            ReconcileConfig::default().busy_timeout_ms
        );
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = ReconcileConfig::from_json_str(r#"{"max_sequence_attempts": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroSequenceAttempts));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ReconcileConfig::from_json_str(r#"{"retries": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
