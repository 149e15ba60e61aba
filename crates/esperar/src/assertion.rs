//! Retrying assertions ("should").
//!
//! Each condition is a named predicate over a subject (element, collection or
//! session) plus a best-effort read of the actual value for the failure
//! message. Evaluating a condition runs its own [`Waiter`]; when the waiter
//! gives up, the timeout is translated into an [`AssertionFailure`] carrying
//! expected and actual values.
//!
//! ## Toyota Way Application:
//! - **Heijunka**: the same polling loop as plain queries
//! - **Jidoka**: fail with expected and actual, never with a bare timeout

mod collection;
mod element;
mod session;

pub use collection::ElementsShould;
pub use element::ElementShould;
pub use session::SessionShould;

use crate::log::EventLog;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{Truthy, WaitConfig, Waiter};
use std::fmt;

/// Placeholder for an actual value that could not be read
pub const UNAVAILABLE: &str = "<unavailable>";

/// Placeholder for an element that left the document
pub const DETACHED: &str = "<detached>";

/// Whether a condition asserts presence of a state or its absence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// e.g. `be_visible`, `have_text`
    Positive,
    /// e.g. `not_have_attr`, `disappear`
    Negative,
}

/// A `should()` condition that was not met in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    /// Condition name, e.g. `have_text`
    pub condition: String,
    /// Polarity of the condition
    pub polarity: Polarity,
    /// Expected value
    pub expected: String,
    /// Last observed value, or [`UNAVAILABLE`]
    pub actual: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expected {} `{}` - Actual `{}`",
            self.condition, self.expected, self.actual
        )
    }
}

impl std::error::Error for AssertionFailure {}

type Check<'a, S, R> = Box<dyn FnMut(&S) -> EsperarResult<R> + 'a>;
type Observe<'a, S> = Box<dyn Fn(&S) -> EsperarResult<String> + 'a>;

/// Named, pollable predicate over a subject `S`
pub struct Condition<'a, S: ?Sized, R> {
    name: &'static str,
    polarity: Polarity,
    expected: String,
    check: Check<'a, S, R>,
    observe: Observe<'a, S>,
}

impl<S: ?Sized, R> fmt::Debug for Condition<'_, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("polarity", &self.polarity)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

impl<'a, S: ?Sized, R: Truthy> Condition<'a, S, R> {
    /// Build a condition from a check and an observer of the actual value
    pub fn new(
        name: &'static str,
        polarity: Polarity,
        expected: impl Into<String>,
        check: impl FnMut(&S) -> EsperarResult<R> + 'a,
        observe: impl Fn(&S) -> EsperarResult<String> + 'a,
    ) -> Self {
        Self {
            name,
            polarity,
            expected: expected.into(),
            check: Box::new(check),
            observe: Box::new(observe),
        }
    }

    /// Condition name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Condition polarity
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Poll the condition against `subject`.
    ///
    /// # Errors
    ///
    /// `Assertion` when the waiter times out, or when a zero-timeout attempt
    /// raises a tolerated error. Other errors propagate unchanged.
    pub fn evaluate(
        self,
        subject: &S,
        config: &WaitConfig,
        log: &dyn EventLog,
    ) -> EsperarResult<R::Output> {
        let Self {
            name,
            polarity,
            expected,
            check,
            observe,
        } = self;

        let message = format!("should().{name}() `{expected}`");
        let waiter = Waiter::new(subject, config.clone(), log);
        match waiter.until(check, &message) {
            Ok(value) => {
                log.record(&format!("should().{name}() - `{expected}`"));
                Ok(value)
            }
            Err(error) if translates(&error, config) => {
                let actual = observe(subject).unwrap_or_else(|_| UNAVAILABLE.to_string());
                let failure = AssertionFailure {
                    condition: name.to_string(),
                    polarity,
                    expected,
                    actual,
                };
                log.record(&format!("FAILED should().{name}() - {failure}"));
                Err(failure.into())
            }
            Err(error) => Err(error),
        }
    }
}

fn translates(error: &EsperarError, config: &WaitConfig) -> bool {
    error.is_timeout() || (config.is_single_attempt() && config.tolerates(error))
}

/// Compare text with optional case folding and whitespace trimming
pub(crate) fn text_matches(actual: &str, expected: &str, case_sensitive: bool, trim: bool) -> bool {
    let (actual, expected) = if trim {
        (actual.trim(), expected.trim())
    } else {
        (actual, expected)
    };
    if case_sensitive {
        actual == expected
    } else {
        actual.to_lowercase() == expected.to_lowercase()
    }
}

/// Substring test with optional case folding
pub(crate) fn text_contains(actual: &str, expected: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        actual.contains(expected)
    } else {
        actual.to_lowercase().contains(&expected.to_lowercase())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::result::ErrorKind;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig::new(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(10))
    }

    mod failure_tests {
        use super::*;

        #[test]
        fn test_failure_display() {
            let failure = AssertionFailure {
                condition: "have_text".into(),
                polarity: Polarity::Positive,
                expected: "Hello".into(),
                actual: "Hi".into(),
            };
            assert_eq!(failure.to_string(), "Expected have_text `Hello` - Actual `Hi`");
        }

        #[test]
        fn test_failure_converts_to_error() {
            let failure = AssertionFailure {
                condition: "be_visible".into(),
                polarity: Polarity::Positive,
                expected: "visible".into(),
                actual: "hidden".into(),
            };
            let error: EsperarError = failure.into();
            assert_eq!(error.kind(), ErrorKind::Assertion);
            assert!(error.to_string().starts_with("Expected be_visible"));
        }
    }

    mod engine_tests {
        use super::*;

        #[test]
        fn test_satisfied_condition_returns_value() {
            let log = MemoryLog::new();
            let counter = Cell::new(0);
            let condition = Condition::new(
                "reach_three",
                Polarity::Positive,
                "3",
                |c: &Cell<i32>| {
                    c.set(c.get() + 1);
                    Ok(c.get() >= 3)
                },
                |c: &Cell<i32>| Ok(c.get().to_string()),
            );
            assert!(condition.evaluate(&counter, &fast(500), &log).unwrap());
            assert_eq!(counter.get(), 3);
            assert!(log.contains("should().reach_three() - `3`"));
        }

        #[test]
        fn test_timeout_becomes_assertion_failure() {
            let log = MemoryLog::new();
            let condition = Condition::new(
                "have_text",
                Polarity::Positive,
                "Hello",
                |s: &String| Ok(s == "Hello"),
                |s: &String| Ok(s.clone()),
            );
            let err = condition
                .evaluate(&"Hi".to_string(), &fast(40), &log)
                .unwrap_err();
            match err {
                EsperarError::Assertion(failure) => {
                    assert_eq!(failure.expected, "Hello");
                    assert_eq!(failure.actual, "Hi");
                }
                other => panic!("expected assertion failure, got {other:?}"),
            }
            assert!(log.contains("FAILED should().have_text()"));
        }

        #[test]
        fn test_unreadable_actual_is_unavailable() {
            let condition = Condition::new(
                "be_visible",
                Polarity::Positive,
                "visible",
                |_: &()| Ok(false),
                |_: &()| Err(EsperarError::script("boom")),
            );
            let err = condition.evaluate(&(), &fast(20), &MemoryLog::new()).unwrap_err();
            assert!(err.to_string().contains(UNAVAILABLE));
        }

        #[test]
        fn test_zero_timeout_tolerated_error_is_translated() {
            let condition = Condition::new(
                "be_visible",
                Polarity::Positive,
                "visible",
                |_: &()| -> EsperarResult<bool> { Err(EsperarError::not_found("x")) },
                |_: &()| Ok("missing".to_string()),
            );
            let err = condition.evaluate(&(), &fast(0), &MemoryLog::new()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Assertion);
        }

        #[test]
        fn test_non_tolerated_error_propagates() {
            let condition = Condition::new(
                "be_visible",
                Polarity::Positive,
                "visible",
                |_: &()| -> EsperarResult<bool> { Err(EsperarError::structural("bad")) },
                |_: &()| Ok(String::new()),
            );
            let err = condition.evaluate(&(), &fast(200), &MemoryLog::new()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Structural);
        }
    }

    mod text_tests {
        use super::*;

        #[test]
        fn test_text_matches_flags() {
            assert!(text_matches("Hello", "Hello", true, false));
            assert!(!text_matches("hello", "Hello", true, false));
            assert!(text_matches("hello", "Hello", false, false));
            assert!(!text_matches(" Hello ", "Hello", true, false));
            assert!(text_matches(" Hello ", "Hello", true, true));
        }

        #[test]
        fn test_text_contains_flags() {
            assert!(text_contains("Hello world", "world", true));
            assert!(!text_contains("Hello World", "world", true));
            assert!(text_contains("Hello World", "world", false));
        }
    }
}
