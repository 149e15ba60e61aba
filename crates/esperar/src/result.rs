//! Result and error types for Esperar.

use std::time::Duration;
use thiserror::Error;

use crate::assertion::AssertionFailure;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Closed set of error categories.
///
/// The waiter decides whether to retry or fail fast purely on this value.
/// Only the kinds for which [`ErrorKind::is_tolerable`] holds may ever be
/// placed in a [`WaitConfig`](crate::WaitConfig)'s tolerated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// No node matched a find-one query
    NotFound,
    /// A resolved reference no longer points into the live document
    StaleElement,
    /// The node exists but cannot receive the interaction
    NotInteractable,
    /// Script evaluation failed inside the backend
    Script,
    /// Any other backend round-trip failure
    Backend,
    /// Malformed selector syntax
    InvalidSelector,
    /// Invalid argument or configuration value
    InvalidArgument,
    /// Operation does not fit the element's structure
    Structural,
    /// Handle has no locator to re-resolve with
    NotResolvable,
    /// `first()`/`last()` on an empty collection
    EmptyCollection,
    /// The waiter ran out of time
    Timeout,
    /// A `should()` condition was not met
    Assertion,
    /// Local I/O or serialization failure
    Io,
}

impl ErrorKind {
    /// Whether this kind may be tolerated during polling.
    ///
    /// Programmer errors and structural mismatches never are: retrying cannot
    /// change their outcome.
    #[must_use]
    pub const fn is_tolerable(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::StaleElement | Self::NotInteractable | Self::Script | Self::Backend
        )
    }

    /// Short name used in log events
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::StaleElement => "stale-element",
            Self::NotInteractable => "not-interactable",
            Self::Script => "script",
            Self::Backend => "backend",
            Self::InvalidSelector => "invalid-selector",
            Self::InvalidArgument => "invalid-argument",
            Self::Structural => "structural",
            Self::NotResolvable => "not-resolvable",
            Self::EmptyCollection => "empty-collection",
            Self::Timeout => "timeout",
            Self::Assertion => "assertion",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in Esperar
#[derive(Debug, Error)]
pub enum EsperarError {
    /// No element matched the locator
    #[error("No element found for {locator}")]
    NotFound {
        /// Human-readable locator description
        locator: String,
    },

    /// Element reference is detached from the document
    #[error("Stale element reference: {message}")]
    StaleElement {
        /// Error message
        message: String,
    },

    /// Element cannot be interacted with
    #[error("Element not interactable: {message}")]
    NotInteractable {
        /// Error message
        message: String,
    },

    /// Script evaluation failed
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Backend session error
    #[error("Backend error: {message}")]
    Backend {
        /// Error message
        message: String,
    },

    /// Malformed selector
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector {
        /// The offending selector
        selector: String,
        /// Error message
        message: String,
    },

    /// Invalid argument or configuration value
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Operation does not match the element's structure
    #[error("Structural error: {message}")]
    Structural {
        /// Error message
        message: String,
    },

    /// Handle was derived by navigation and cannot be re-resolved
    #[error("Element cannot be re-resolved: {message}")]
    NotResolvable {
        /// Error message
        message: String,
    },

    /// Collection had no elements
    #[error("Collection is empty: {locator}")]
    EmptyCollection {
        /// Human-readable origin of the collection
        locator: String,
    },

    /// No polling attempt succeeded in time
    #[error(
        "{message} (timed out after {}ms, {attempts} attempt(s)){}",
        .timeout.as_millis(),
        diagnostic_suffix(.last_error)
    )]
    WaitTimeout {
        /// Caller-supplied description of what was awaited
        message: String,
        /// Configured timeout
        timeout: Duration,
        /// Number of predicate invocations
        attempts: usize,
        /// Last tolerated failure, kept as diagnostic payload
        last_error: Option<Box<EsperarError>>,
    },

    /// A `should()` condition failed
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn diagnostic_suffix(last_error: &Option<Box<EsperarError>>) -> String {
    last_error
        .as_ref()
        .map(|e| format!("; last error: {e}"))
        .unwrap_or_default()
}

impl EsperarError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::StaleElement { .. } => ErrorKind::StaleElement,
            Self::NotInteractable { .. } => ErrorKind::NotInteractable,
            Self::Script { .. } => ErrorKind::Script,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::InvalidSelector { .. } => ErrorKind::InvalidSelector,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Structural { .. } => ErrorKind::Structural,
            Self::NotResolvable { .. } => ErrorKind::NotResolvable,
            Self::EmptyCollection { .. } => ErrorKind::EmptyCollection,
            Self::WaitTimeout { .. } => ErrorKind::Timeout,
            Self::Assertion(_) => ErrorKind::Assertion,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    /// Create a not-found error
    #[must_use]
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::NotFound {
            locator: locator.into(),
        }
    }

    /// Create a stale element error
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleElement {
            message: message.into(),
        }
    }

    /// Create a structural error
    #[must_use]
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Whether this is a waiter timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}
