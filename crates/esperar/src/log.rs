//! Step logging.
//!
//! Every query, action and condition records one human-readable event through
//! the [`EventLog`] collaborator handed to the [`Session`](crate::Session) at
//! construction. There is no global logger: the collaborator is threaded down
//! into the waiter and the assertion engine explicitly.

use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Tracing target used for step events
pub const LOG_TARGET: &str = "esperar";

/// Logging collaborator with a single capability
pub trait EventLog: Send + Sync {
    /// Record one step event
    fn record(&self, event: &str);
}

/// Default log: forwards events to `tracing` under the `esperar` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn record(&self, event: &str) {
        if event.starts_with("FAILED") {
            tracing::warn!(target: LOG_TARGET, "{event}");
        } else {
            tracing::info!(target: LOG_TARGET, "{event}");
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl EventLog for NullLog {
    fn record(&self, _event: &str) {}
}

/// Keeps events in memory, mostly useful in tests
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<String>>,
}

impl MemoryLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Whether any recorded event contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.contains(needle))
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLog for MemoryLog {
    fn record(&self, event: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.to_string());
        }
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to `level`.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// Returns `true` when this call installed it.
pub fn init_tracing(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Like [`init_tracing`], but emits one JSON object per event.
pub fn init_json_tracing(level: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(level))
        .with_current_span(false)
        .try_init()
        .is_ok()
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{LOG_TARGET}={level}")))
        .unwrap_or_else(|_| EnvFilter::new(format!("{LOG_TARGET}=info")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_records_in_order() {
        let log = MemoryLog::new();
        assert!(log.is_empty());
        log.record("get() - first");
        log.record("FAILED should().be_visible()");
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0], "get() - first");
        assert!(log.contains("be_visible"));
        assert!(!log.contains("be_hidden"));
    }

    #[test]
    fn test_null_and_tracing_logs_accept_events() {
        NullLog.record("ignored");
        TracingLog.record("get() - forwarded");
        TracingLog.record("FAILED forwarded");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let _ = init_tracing("debug");
        assert!(!init_tracing("debug"));
        assert!(!init_json_tracing("debug"));
    }
}
