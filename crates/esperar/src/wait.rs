//! Wait Mechanisms
//!
//! A generic condition-polling waiter. It knows nothing about the DOM: it
//! repeatedly evaluates a predicate against a target until the predicate
//! yields a truthy value or the timeout elapses.
//!
//! ## Design
//!
//! - **Jidoka**: only explicitly tolerated error kinds are retried; anything
//!   else stops the loop at once
//! - **Heijunka**: fixed poll interval, so test timing is predictable
//! - **Poka-Yoke**: the tolerated set is a closed enum, programmer errors can
//!   never be put in it

use crate::log::{EventLog, NullLog};
use crate::result::{ErrorKind, EsperarError, EsperarResult};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

// =============================================================================
// WAIT CONFIG
// =============================================================================

/// Immutable description of one wait: timeout, poll interval and the error
/// kinds to tolerate while polling.
///
/// A zero timeout means "poll exactly once, synchronously, no retry".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    timeout: Duration,
    poll_interval: Duration,
    tolerated: BTreeSet<ErrorKind>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            tolerated: BTreeSet::from([ErrorKind::NotFound]),
        }
    }
}

impl WaitConfig {
    /// Create a config with the given timeout and default interval
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Create a config from fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for negative, non-finite or out-of-range
    /// values, or a non-positive poll interval.
    pub fn from_secs_f64(timeout_secs: f64, poll_interval_secs: f64) -> EsperarResult<Self> {
        if !timeout_secs.is_finite() || timeout_secs < 0.0 {
            return Err(EsperarError::invalid_argument(format!(
                "timeout must be a finite number >= 0, got {timeout_secs}"
            )));
        }
        if !poll_interval_secs.is_finite() || poll_interval_secs <= 0.0 {
            return Err(EsperarError::invalid_argument(format!(
                "poll interval must be a finite number > 0, got {poll_interval_secs}"
            )));
        }
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|e| {
            EsperarError::invalid_argument(format!("timeout of {timeout_secs}s: {e}"))
        })?;
        let poll_interval = Duration::try_from_secs_f64(poll_interval_secs).map_err(|e| {
            EsperarError::invalid_argument(format!("poll interval of {poll_interval_secs}s: {e}"))
        })?;
        Ok(Self::new(timeout).with_poll_interval(poll_interval))
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Add a kind to the tolerated set.
    ///
    /// Non-tolerable kinds are ignored.
    #[must_use]
    pub fn tolerate(mut self, kind: ErrorKind) -> Self {
        if kind.is_tolerable() {
            self.tolerated.insert(kind);
        } else {
            tracing::warn!(
                target: crate::log::LOG_TARGET,
                "ignoring request to tolerate `{kind}` errors while polling"
            );
        }
        self
    }

    /// Replace the tolerated set
    #[must_use]
    pub fn tolerating(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.tolerated.clear();
        for kind in kinds {
            self = self.tolerate(kind);
        }
        self
    }

    /// Timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Tolerated kinds
    #[must_use]
    pub const fn tolerated(&self) -> &BTreeSet<ErrorKind> {
        &self.tolerated
    }

    /// Whether `error` should be swallowed and retried
    #[must_use]
    pub fn tolerates(&self, error: &EsperarError) -> bool {
        self.tolerated.contains(&error.kind())
    }

    /// Whether this config polls exactly once
    #[must_use]
    pub const fn is_single_attempt(&self) -> bool {
        self.timeout.is_zero()
    }

    /// Check the invariants a hand-built config may violate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the poll interval is zero.
    pub fn validate(&self) -> EsperarResult<()> {
        if self.poll_interval.is_zero() {
            return Err(EsperarError::invalid_argument(
                "poll interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TRUTHINESS
// =============================================================================

/// Maps a raw predicate value to "satisfied with `Output`" or "not yet".
pub trait Truthy {
    /// Value handed back to the caller once satisfied
    type Output;

    /// `Some` when the value counts as satisfied
    fn truthy(self) -> Option<Self::Output>;
}

impl Truthy for bool {
    type Output = bool;

    fn truthy(self) -> Option<bool> {
        self.then_some(true)
    }
}

impl<T> Truthy for Option<T> {
    type Output = T;

    fn truthy(self) -> Option<T> {
        self
    }
}

impl<T> Truthy for Vec<T> {
    type Output = Vec<T>;

    fn truthy(self) -> Option<Vec<T>> {
        (!self.is_empty()).then_some(self)
    }
}

impl Truthy for String {
    type Output = String;

    fn truthy(self) -> Option<String> {
        (!self.is_empty()).then_some(self)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Outcome of a wait that produces no value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of predicate invocations
    pub attempts: usize,
}

// =============================================================================
// WAITER IMPLEMENTATION
// =============================================================================

/// Generic retry combinator over a target.
///
/// Attempts are strictly sequential and the calling thread blocks between
/// them. Timeout is only checked between attempts, so an in-flight backend
/// call is never interrupted.
pub struct Waiter<'a, T: ?Sized> {
    target: &'a T,
    config: WaitConfig,
    log: &'a dyn EventLog,
}

impl<T: ?Sized> std::fmt::Debug for Waiter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a, T: ?Sized> Waiter<'a, T> {
    /// Create a waiter over `target`
    #[must_use]
    pub fn new(target: &'a T, config: WaitConfig, log: &'a dyn EventLog) -> Self {
        Self {
            target,
            config,
            log,
        }
    }

    /// The effective config
    #[must_use]
    pub const fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// The target predicates are evaluated against
    #[must_use]
    pub const fn target(&self) -> &'a T {
        self.target
    }

    /// Block the calling thread.
    ///
    /// Prefer a condition over a fixed sleep.
    pub fn sleep(&self, duration: Duration) {
        self.log
            .record(&format!("wait.sleep() - sleep for {}ms", duration.as_millis()));
        std::thread::sleep(duration);
    }

    /// Poll until `predicate` yields a truthy value.
    ///
    /// # Errors
    ///
    /// - the predicate's own error if it is not tolerated (immediately)
    /// - the predicate's own error on a zero timeout
    /// - `WaitTimeout` carrying `message` and the last tolerated error
    pub fn until<R, F>(&self, mut predicate: F, message: &str) -> EsperarResult<R::Output>
    where
        R: Truthy,
        F: FnMut(&T) -> EsperarResult<R>,
    {
        self.config.validate()?;
        let start = Instant::now();

        if self.config.is_single_attempt() {
            tracing::trace!(target: crate::log::LOG_TARGET, "single attempt: {message}");
            return match predicate(self.target)?.truthy() {
                Some(value) => Ok(value),
                None => Err(self.timed_out(message, start, 1, None)),
            };
        }

        let mut attempts = 0;
        let mut last_error: Option<EsperarError> = None;

        loop {
            attempts += 1;
            match predicate(self.target) {
                Ok(value) => {
                    if let Some(value) = value.truthy() {
                        tracing::trace!(
                            target: crate::log::LOG_TARGET,
                            attempts,
                            "satisfied: {message}"
                        );
                        return Ok(value);
                    }
                }
                Err(error) if self.config.tolerates(&error) => {
                    tracing::trace!(
                        target: crate::log::LOG_TARGET,
                        attempts,
                        kind = %error.kind(),
                        "tolerated: {error}"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }

            std::thread::sleep(self.config.poll_interval);

            if start.elapsed() >= self.config.timeout {
                return Err(self.timed_out(message, start, attempts, last_error));
            }
        }
    }

    /// Poll until `predicate` is falsy or raises a tolerated error.
    ///
    /// # Errors
    ///
    /// Non-tolerated errors propagate; `WaitTimeout` if the predicate stays
    /// truthy.
    pub fn until_not<R, F>(&self, mut predicate: F, message: &str) -> EsperarResult<WaitResult>
    where
        R: Truthy,
        F: FnMut(&T) -> EsperarResult<R>,
    {
        self.config.validate()?;
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let gone = match predicate(self.target) {
                Ok(value) => value.truthy().is_none(),
                Err(error) if self.config.tolerates(&error) => true,
                Err(error) => return Err(error),
            };
            if gone {
                return Ok(WaitResult {
                    elapsed: start.elapsed(),
                    attempts,
                });
            }
            if self.config.is_single_attempt() {
                return Err(self.timed_out(message, start, attempts, None));
            }

            std::thread::sleep(self.config.poll_interval);

            if start.elapsed() >= self.config.timeout {
                return Err(self.timed_out(message, start, attempts, None));
            }
        }
    }

    fn timed_out(
        &self,
        message: &str,
        start: Instant,
        attempts: usize,
        last_error: Option<EsperarError>,
    ) -> EsperarError {
        self.log.record(&format!(
            "FAILED wait.until() - {message} ({attempts} attempt(s) in {}ms)",
            start.elapsed().as_millis()
        ));
        EsperarError::WaitTimeout {
            message: message.to_string(),
            timeout: self.config.timeout,
            attempts,
            last_error: last_error.map(Box::new),
        }
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Poll a target-less predicate with `config`
///
/// # Errors
///
/// Same as [`Waiter::until`].
pub fn wait_until<R, F>(mut predicate: F, config: &WaitConfig, message: &str) -> EsperarResult<R::Output>
where
    R: Truthy,
    F: FnMut() -> EsperarResult<R>,
{
    Waiter::new(&(), config.clone(), &NullLog).until(|_| predicate(), message)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use std::cell::Cell;

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig::new(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(10))
    }

    mod wait_config_tests {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = WaitConfig::default();
            assert_eq!(config.timeout(), Duration::from_secs(10));
            assert_eq!(config.poll_interval(), Duration::from_millis(500));
            assert!(config.tolerated().contains(&ErrorKind::NotFound));
            assert_eq!(config.tolerated().len(), 1);
        }

        #[test]
        fn test_from_secs_f64() {
            let config = WaitConfig::from_secs_f64(1.5, 0.25).unwrap();
            assert_eq!(config.timeout(), Duration::from_millis(1500));
            assert_eq!(config.poll_interval(), Duration::from_millis(250));
        }

        #[test]
        fn test_from_secs_f64_rejects_bad_values() {
            assert!(WaitConfig::from_secs_f64(-1.0, 0.5).is_err());
            assert!(WaitConfig::from_secs_f64(f64::NAN, 0.5).is_err());
            assert!(WaitConfig::from_secs_f64(1.0, 0.0).is_err());
        }

        #[test]
        fn test_from_secs_f64_rejects_oversized_values() {
            let err = WaitConfig::from_secs_f64(1e20, 0.5).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            let err = WaitConfig::from_secs_f64(1.0, 1e20).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }

        #[test]
        fn test_tolerate_ignores_programmer_errors() {
            let config = WaitConfig::default()
                .tolerate(ErrorKind::InvalidSelector)
                .tolerate(ErrorKind::StaleElement);
            assert!(!config.tolerated().contains(&ErrorKind::InvalidSelector));
            assert!(config.tolerated().contains(&ErrorKind::StaleElement));
        }

        #[test]
        fn test_tolerating_replaces_set() {
            let config = WaitConfig::default().tolerating([ErrorKind::StaleElement]);
            assert!(!config.tolerates(&EsperarError::not_found("x")));
            assert!(config.tolerates(&EsperarError::stale("x")));
        }

        #[test]
        fn test_zero_poll_interval_invalid() {
            let config = WaitConfig::default().with_poll_interval(Duration::ZERO);
            assert!(config.validate().is_err());
        }
    }

    mod truthy_tests {
        use super::*;

        #[test]
        fn test_truthy_values() {
            assert_eq!(true.truthy(), Some(true));
            assert_eq!(false.truthy(), None);
            assert_eq!(Some(3).truthy(), Some(3));
            assert_eq!(None::<i32>.truthy(), None);
            assert_eq!(vec![1].truthy(), Some(vec![1]));
            assert_eq!(Vec::<i32>::new().truthy(), None);
            assert_eq!(String::new().truthy(), None);
            assert_eq!("a".to_string().truthy(), Some("a".to_string()));
        }
    }

    mod waiter_tests {
        use super::*;

        #[test]
        fn test_immediate_success_does_not_sleep() {
            let config = WaitConfig::new(Duration::from_secs(1))
                .with_poll_interval(Duration::from_millis(200));
            let start = Instant::now();
            let value = wait_until(|| Ok(Some(42)), &config, "answer").unwrap();
            assert_eq!(value, 42);
            assert!(start.elapsed() < Duration::from_millis(200));
        }

        #[test]
        fn test_timeout_bound() {
            let config = fast(200).with_poll_interval(Duration::from_millis(20));
            let start = Instant::now();
            let err = wait_until(|| Ok(false), &config, "never").unwrap_err();
            let elapsed = start.elapsed();
            assert!(err.is_timeout());
            assert!(elapsed >= Duration::from_millis(200));
            assert!(elapsed < Duration::from_millis(200 + 20 + 150));
        }

        #[test]
        fn test_tolerated_errors_are_retried() {
            let calls = Cell::new(0);
            let value = wait_until(
                || {
                    calls.set(calls.get() + 1);
                    if calls.get() < 3 {
                        Err(EsperarError::not_found("css `#late`"))
                    } else {
                        Ok(Some("third"))
                    }
                },
                &fast(1000),
                "late element",
            )
            .unwrap();
            assert_eq!(value, "third");
            assert_eq!(calls.get(), 3);
        }

        #[test]
        fn test_non_tolerated_error_fails_fast() {
            let calls = Cell::new(0);
            let err = wait_until(
                || -> EsperarResult<bool> {
                    calls.set(calls.get() + 1);
                    Err(EsperarError::InvalidSelector {
                        selector: "##".into(),
                        message: "bad".into(),
                    })
                },
                &fast(1000),
                "bad selector",
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSelector);
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_zero_timeout_single_attempt_raises_own_error() {
            let calls = Cell::new(0);
            let err = wait_until(
                || -> EsperarResult<bool> {
                    calls.set(calls.get() + 1);
                    Err(EsperarError::not_found("css `#missing`"))
                },
                &fast(0),
                "missing",
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_zero_timeout_falsy_is_timeout() {
            let calls = Cell::new(0);
            let err = wait_until(
                || {
                    calls.set(calls.get() + 1);
                    Ok(false)
                },
                &fast(0),
                "falsy",
            )
            .unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_timeout_carries_last_tolerated_error() {
            let err = wait_until(
                || -> EsperarResult<bool> { Err(EsperarError::not_found("css `.x`")) },
                &fast(50),
                "Could not find `.x`",
            )
            .unwrap_err();
            match err {
                EsperarError::WaitTimeout {
                    message,
                    last_error,
                    attempts,
                    ..
                } => {
                    assert_eq!(message, "Could not find `.x`");
                    assert!(attempts >= 1);
                    assert_eq!(last_error.unwrap().kind(), ErrorKind::NotFound);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_waiter_passes_target() {
            let log = MemoryLog::new();
            let target = vec![1, 2, 3];
            let waiter = Waiter::new(&target, fast(100), &log);
            let len = waiter.until(|t| Ok(Some(t.len())), "len").unwrap();
            assert_eq!(len, 3);
            assert!(log.is_empty());
        }

        #[test]
        fn test_timeout_is_recorded() {
            let log = MemoryLog::new();
            let waiter = Waiter::new(&(), fast(30), &log);
            let _ = waiter.until(|_| Ok(false), "never true");
            assert!(log.contains("FAILED wait.until() - never true"));
        }

        #[test]
        fn test_until_not_succeeds_when_falsy() {
            let calls = Cell::new(0);
            let waiter = Waiter::new(&(), fast(500), &NullLog);
            let result = waiter
                .until_not(
                    |_| {
                        calls.set(calls.get() + 1);
                        Ok(calls.get() < 3)
                    },
                    "flag clears",
                )
                .unwrap();
            assert_eq!(result.attempts, 3);
        }

        #[test]
        fn test_until_not_treats_tolerated_error_as_gone() {
            let waiter = Waiter::new(&(), fast(100), &NullLog);
            let result = waiter
                .until_not(
                    |_| -> EsperarResult<bool> { Err(EsperarError::not_found("x")) },
                    "gone",
                )
                .unwrap();
            assert_eq!(result.attempts, 1);
        }

        #[test]
        fn test_until_not_times_out() {
            let waiter = Waiter::new(&(), fast(40), &NullLog);
            let err = waiter.until_not(|_| Ok(true), "still there").unwrap_err();
            assert!(err.is_timeout());
        }

        #[test]
        fn test_sleep_records_event() {
            let log = MemoryLog::new();
            let waiter = Waiter::new(&(), fast(10), &log);
            let start = Instant::now();
            waiter.sleep(Duration::from_millis(20));
            assert!(start.elapsed() >= Duration::from_millis(20));
            assert!(log.contains("wait.sleep()"));
        }
    }
}
