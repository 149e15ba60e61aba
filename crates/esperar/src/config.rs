//! Session configuration.
//!
//! Timings are written in seconds, the way test authors think about them, and
//! converted to a [`WaitConfig`] once when the session is built.
//!
//! ```json
//! {
//!   "wait_time": 10,
//!   "poll_interval": 0.5,
//!   "logging": { "level": "debug", "json": false }
//! }
//! ```

use crate::log::{init_json_tracing, init_tracing};
use crate::result::EsperarResult;
use crate::wait::{WaitConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by every wait a session performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default timeout in seconds
    #[serde(default = "default_wait_time")]
    pub wait_time: f64,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Step log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_time: default_wait_time(),
            poll_interval: default_poll_interval(),
            logging: LoggingConfig::default(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn default_wait_time() -> f64 {
    DEFAULT_WAIT_TIMEOUT_MS as f64 / 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn default_poll_interval() -> f64 {
    DEFAULT_POLL_INTERVAL_MS as f64 / 1000.0
}

/// Step log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for the `esperar` target when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl SessionConfig {
    /// Parse from a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> EsperarResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> EsperarResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> EsperarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validated wait settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative or out-of-range timeout, or a
    /// non-positive poll interval.
    pub fn wait_config(&self) -> EsperarResult<WaitConfig> {
        WaitConfig::from_secs_f64(self.wait_time, self.poll_interval)
    }

    /// Install the global `tracing` subscriber described by `logging`.
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        if self.logging.json {
            init_json_tracing(&self.logging.level)
        } else {
            init_tracing(&self.logging.level)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::ErrorKind;
    use std::time::Duration;

    mod parsing {
        use super::*;

        #[test]
        fn test_empty_document_uses_defaults() {
            let config = SessionConfig::from_json_str("{}").unwrap();
            assert_eq!(config, SessionConfig::default());
            assert!((config.wait_time - 10.0).abs() < f64::EPSILON);
            assert!((config.poll_interval - 0.5).abs() < f64::EPSILON);
            assert_eq!(config.logging.level, "info");
            assert!(!config.logging.json);
        }

        #[test]
        fn test_partial_document() {
            let config =
                SessionConfig::from_json_str(r#"{"wait_time": 2, "logging": {"json": true}}"#)
                    .unwrap();
            assert!((config.wait_time - 2.0).abs() < f64::EPSILON);
            assert!(config.logging.json);
            assert_eq!(config.logging.level, "info");
        }

        #[test]
        fn test_malformed_json_is_io_kind() {
            let err = SessionConfig::from_json_str("{wait_time").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Io);
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("esperar.json");
            std::fs::write(&path, r#"{"poll_interval": 0.1}"#).unwrap();
            let config = SessionConfig::from_json_file(&path).unwrap();
            assert!((config.poll_interval - 0.1).abs() < f64::EPSILON);
        }

        #[test]
        fn test_missing_file() {
            let dir = tempfile::tempdir().unwrap();
            let err = SessionConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Io);
        }

        #[test]
        fn test_to_json_reloads() {
            let config = SessionConfig {
                wait_time: 3.0,
                ..SessionConfig::default()
            };
            let json = config.to_json().unwrap();
            assert!(json.contains("\"wait_time\": 3.0"));
        }
    }

    mod wait_config {
        use super::*;

        #[test]
        fn test_converts_seconds() {
            let config = SessionConfig::from_json_str(r#"{"wait_time": 1.5, "poll_interval": 0.25}"#)
                .unwrap()
                .wait_config()
                .unwrap();
            assert_eq!(config.timeout(), Duration::from_millis(1500));
            assert_eq!(config.poll_interval(), Duration::from_millis(250));
        }

        #[test]
        fn test_zero_wait_time_is_allowed() {
            let config = SessionConfig::from_json_str(r#"{"wait_time": 0}"#)
                .unwrap()
                .wait_config()
                .unwrap();
            assert!(config.is_single_attempt());
        }

        #[test]
        fn test_oversized_wait_time_is_invalid_argument() {
            let err = SessionConfig::from_json_str(r#"{"wait_time": 1e20}"#)
                .unwrap()
                .wait_config()
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }

        #[test]
        fn test_rejects_zero_poll_interval() {
            let err = SessionConfig::from_json_str(r#"{"poll_interval": 0}"#)
                .unwrap()
                .wait_config()
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }
}
