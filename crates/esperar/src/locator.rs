//! Locator abstraction for element selection.
//!
//! A [`Locator`] is an immutable (strategy, selector) pair. It is used both for
//! the initial query and for re-resolving a handle later, so every handle
//! produced by a [`Finder`] keeps its locator and scope.
//!
//! # Design Philosophy
//!
//! - **Auto-Waiting**: find-one queries retry on `NotFound` until the timeout
//! - **Fail Fast**: malformed selectors are rejected before the backend is asked
//! - **Explicit empty policy**: find-many says up front whether empty is a miss

use crate::element::{ElementHandle, Elements};
use crate::driver::ElementRef;
use crate::result::{EsperarError, EsperarResult};
use crate::session::Session;
use crate::wait::{WaitConfig, Waiter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a selector is interpreted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// CSS selector (e.g., "button.primary")
    Css,
    /// XPath expression
    XPath,
    /// Nodes whose own text contains the selector
    TextContains,
}

impl Strategy {
    /// Label used in messages
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Css => "CSS",
            Self::XPath => "XPath",
            Self::TextContains => "text",
        }
    }
}

/// Immutable (strategy, selector) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    selector: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self {
            strategy,
            selector: selector.into(),
        }
    }

    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, selector)
    }

    /// Create a text-contains locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Strategy::TextContains, text)
    }

    /// Get the strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Get the selector
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Render as XPath for backends that only speak XPath.
    ///
    /// CSS has no XPath rendering and yields `None`.
    #[must_use]
    pub fn to_xpath(&self) -> Option<String> {
        match self.strategy {
            Strategy::Css => None,
            Strategy::XPath => Some(self.selector.clone()),
            Strategy::TextContains => Some(format!(
                "//*[contains(text(), {})]",
                xpath_literal(&self.selector)
            )),
        }
    }

    /// Reject selectors that can never match.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` for an empty selector or an XPath that is not
    /// a path expression.
    pub fn validate(&self) -> EsperarResult<()> {
        if self.selector.trim().is_empty() {
            return Err(self.invalid("selector is empty"));
        }
        if self.strategy == Strategy::XPath {
            let s = self.selector.trim_start();
            if !(s.starts_with('/') || s.starts_with("./") || s.starts_with('(') || s.starts_with(".."))
            {
                return Err(self.invalid("XPath must start with `/`, `./`, `..` or `(`"));
            }
        }
        Ok(())
    }

    fn invalid(&self, message: &str) -> EsperarError {
        EsperarError::InvalidSelector {
            selector: self.selector.clone(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.strategy.label(), self.selector)
    }
}

/// Quote `text` as an XPath string literal
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{text}\"")
    } else if !text.contains('\'') {
        format!("'{text}'")
    } else {
        let parts: Vec<String> = text.split('"').map(|p| format!("\"{p}\"")).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// Where a query runs: the whole document or one element's subtree
#[derive(Debug, Clone)]
pub enum Scope {
    /// Document root
    Document,
    /// Subtree of an element
    Element(Box<ElementHandle>),
}

impl Scope {
    /// Backend reference of the scope element, `None` for the document
    #[must_use]
    pub fn element_ref(&self) -> Option<&ElementRef> {
        match self {
            Self::Document => None,
            Self::Element(handle) => Some(handle.element_ref()),
        }
    }

    /// Re-resolve the scope element.
    ///
    /// A scope reached by script navigation has no locator and is kept as-is.
    pub(crate) fn refresh(&self) -> EsperarResult<Self> {
        match self {
            Self::Element(handle) if handle.is_resolvable() => {
                Ok(Self::Element(Box::new(handle.refresh()?)))
            }
            other => Ok(other.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Document => String::new(),
            Self::Element(handle) => format!(" inside {}", handle.describe()),
        }
    }
}

// =============================================================================
// FINDER
// =============================================================================

/// Scope plus effective wait config; the query entry point.
///
/// Obtained from [`Session::within`] or [`ElementHandle::within`], or
/// implicitly through the plain `get`/`find` helpers, which use the session
/// default config.
#[derive(Debug, Clone)]
pub struct Finder {
    session: Session,
    scope: Scope,
    config: WaitConfig,
    at_least_one: bool,
}

impl Finder {
    pub(crate) fn new(session: Session, scope: Scope, config: WaitConfig) -> Self {
        Self {
            session,
            scope,
            config,
            at_least_one: true,
        }
    }

    /// Whether find-many retries until at least one node matches.
    ///
    /// With `false`, find-many makes a single attempt and an empty result is
    /// returned as-is.
    #[must_use]
    pub const fn at_least_one(mut self, at_least_one: bool) -> Self {
        self.at_least_one = at_least_one;
        self
    }

    /// Override the timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Tolerate an additional error kind while polling
    #[must_use]
    pub fn tolerating(mut self, kind: crate::result::ErrorKind) -> Self {
        self.config = self.config.tolerate(kind);
        self
    }

    /// Effective config
    #[must_use]
    pub const fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Query scope
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// First element matching a CSS selector
    ///
    /// # Errors
    ///
    /// `InvalidSelector` immediately, the backend error on a zero timeout,
    /// otherwise `WaitTimeout`.
    pub fn get(&self, css: &str) -> EsperarResult<ElementHandle> {
        self.locate(Locator::css(css))
    }

    /// First element matching an XPath
    ///
    /// # Errors
    ///
    /// Same as [`Finder::get`].
    pub fn getx(&self, xpath: &str) -> EsperarResult<ElementHandle> {
        self.locate(Locator::xpath(xpath))
    }

    /// First element whose text contains `text`
    ///
    /// # Errors
    ///
    /// Same as [`Finder::get`].
    pub fn contains(&self, text: &str) -> EsperarResult<ElementHandle> {
        self.locate(Locator::text(text))
    }

    /// All elements matching a CSS selector
    ///
    /// # Errors
    ///
    /// `InvalidSelector` immediately; `WaitTimeout` when nothing appears and
    /// [`Finder::at_least_one`] is set.
    pub fn find(&self, css: &str) -> EsperarResult<Elements> {
        self.locate_all(Locator::css(css))
    }

    /// All elements matching an XPath
    ///
    /// # Errors
    ///
    /// Same as [`Finder::find`].
    pub fn findx(&self, xpath: &str) -> EsperarResult<Elements> {
        self.locate_all(Locator::xpath(xpath))
    }

    /// Resolve one element, retrying tolerated misses
    ///
    /// # Errors
    ///
    /// Same as [`Finder::get`].
    pub fn locate(&self, locator: Locator) -> EsperarResult<ElementHandle> {
        locator.validate()?;
        self.session.record(&format!(
            "get() - find element with {locator}{}",
            self.scope.describe()
        ));

        let scope = self.scope.element_ref();
        let waiter = Waiter::new(&self.session, self.config.clone(), self.session.log());
        let element = waiter.until(
            |session| {
                session
                    .backend()
                    .find_one(scope, locator.strategy(), locator.selector())
            },
            &format!("Could not find element with the {locator}"),
        )?;

        Ok(ElementHandle::located(
            self.session.clone(),
            element,
            locator,
            self.scope.clone(),
            None,
        ))
    }

    /// Resolve the match at `index` of a find-many, retrying until the
    /// result is long enough
    ///
    /// # Errors
    ///
    /// Same as [`Finder::get`]; a result shorter than `index + 1` counts as
    /// a miss.
    pub fn locate_nth(&self, locator: Locator, index: usize) -> EsperarResult<ElementHandle> {
        locator.validate()?;
        self.session.record(&format!(
            "get() - find element {index} with {locator}{}",
            self.scope.describe()
        ));

        let scope = self.scope.element_ref();
        let waiter = Waiter::new(&self.session, self.config.clone(), self.session.log());
        let element = waiter.until(
            |session| {
                let found = session
                    .backend()
                    .find_many(scope, locator.strategy(), locator.selector())?;
                let len = found.len();
                found.into_iter().nth(index).ok_or_else(|| {
                    EsperarError::not_found(format!("{locator} index {index} of {len} match(es)"))
                })
            },
            &format!("Could not find element {index} with the {locator}"),
        )?;

        Ok(ElementHandle::located(
            self.session.clone(),
            element,
            locator,
            self.scope.clone(),
            Some(index),
        ))
    }

    /// Resolve every matching element
    ///
    /// # Errors
    ///
    /// Same as [`Finder::find`].
    pub fn locate_all(&self, locator: Locator) -> EsperarResult<Elements> {
        locator.validate()?;
        self.session.record(&format!(
            "find() - find elements with {locator}{}",
            self.scope.describe()
        ));

        let scope = self.scope.element_ref();
        let found = if self.at_least_one {
            let waiter = Waiter::new(&self.session, self.config.clone(), self.session.log());
            waiter.until(
                |session| {
                    session
                        .backend()
                        .find_many(scope, locator.strategy(), locator.selector())
                },
                &format!("Could not find any elements with the {locator}"),
            )?
        } else {
            self.session
                .backend()
                .find_many(scope, locator.strategy(), locator.selector())?
        };

        Ok(Elements::located(
            self.session.clone(),
            found,
            locator,
            self.scope.clone(),
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
