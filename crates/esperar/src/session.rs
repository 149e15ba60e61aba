//! Session facade.
//!
//! Owns the backend, the default [`WaitConfig`] and the [`EventLog`]. Every
//! handle keeps a cheap clone of its session so it can re-query, act and log.

use crate::assertion::SessionShould;
use crate::config::SessionConfig;
use crate::driver::{script, Backend, ElementRef, ScriptValue};
use crate::element::{ElementHandle, Elements};
use crate::locator::{Finder, Scope};
use crate::log::{EventLog, NullLog, TracingLog};
use crate::result::EsperarResult;
use crate::wait::{WaitConfig, Waiter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// History direction for [`Session::go`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards older entries
    Back,
    /// Towards newer entries
    Forward,
}

/// A cookie visible to the current document.
///
/// Reads only see `name` and `value`; the other fields are used when
/// writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// `path` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `domain` attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// `secure` flag
    #[serde(default)]
    pub secure: bool,
}

impl Cookie {
    /// Name/value cookie without attributes
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            secure: false,
        }
    }

    /// Set the `path` attribute
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the `domain` attribute
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Mark as secure
    #[must_use]
    pub const fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Parse a `document.cookie` string
    fn parse_jar(jar: &str) -> Vec<Self> {
        jar.split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| Self::new(name.trim(), value.trim()))
            .filter(|cookie| !cookie.name.is_empty())
            .collect()
    }

    /// Render as a `document.cookie` assignment
    fn assignment(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            out.push_str(&format!("; path={path}"));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; domain={domain}"));
        }
        if self.secure {
            out.push_str("; secure");
        }
        out
    }
}

/// Outer size of the browser window in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

struct SessionInner {
    backend: Arc<dyn Backend>,
    config: WaitConfig,
    log: Arc<dyn EventLog>,
}

/// Entry point for queries, scripting and session-level conditions.
///
/// Cloning is cheap and yields a handle to the same backend session. One
/// session per worker thread is the expected usage.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session over an already-connected backend
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: WaitConfig, log: Arc<dyn EventLog>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                config,
                log,
            }),
        }
    }

    /// Create a session that logs through `tracing`
    #[must_use]
    pub fn with_tracing(backend: Arc<dyn Backend>, config: WaitConfig) -> Self {
        Self::new(backend, config, Arc::new(TracingLog))
    }

    /// Create a session that discards step events
    #[must_use]
    pub fn with_null_log(backend: Arc<dyn Backend>, config: WaitConfig) -> Self {
        Self::new(backend, config, Arc::new(NullLog))
    }

    /// Create a session from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configured timings are invalid.
    pub fn from_config(backend: Arc<dyn Backend>, config: &SessionConfig) -> EsperarResult<Self> {
        Ok(Self::with_tracing(backend, config.wait_config()?))
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    /// Default wait config
    #[must_use]
    pub fn config(&self) -> &WaitConfig {
        &self.inner.config
    }

    /// Step log
    #[must_use]
    pub fn log(&self) -> &dyn EventLog {
        self.inner.log.as_ref()
    }

    pub(crate) fn record(&self, event: &str) {
        self.inner.log.record(event);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Document-scoped finder with the default config
    #[must_use]
    pub fn finder(&self) -> Finder {
        Finder::new(self.clone(), Scope::Document, self.config().clone())
    }

    /// Document-scoped finder with a timeout override
    #[must_use]
    pub fn within(&self, timeout: Duration) -> Finder {
        self.finder().timeout(timeout)
    }

    /// First element matching a CSS selector
    ///
    /// # Errors
    ///
    /// See [`Finder::get`].
    pub fn get(&self, css: &str) -> EsperarResult<ElementHandle> {
        self.finder().get(css)
    }

    /// First element matching an XPath
    ///
    /// # Errors
    ///
    /// See [`Finder::getx`].
    pub fn getx(&self, xpath: &str) -> EsperarResult<ElementHandle> {
        self.finder().getx(xpath)
    }

    /// First element whose text contains `text`
    ///
    /// # Errors
    ///
    /// See [`Finder::contains`].
    pub fn contains(&self, text: &str) -> EsperarResult<ElementHandle> {
        self.finder().contains(text)
    }

    /// All elements matching a CSS selector
    ///
    /// # Errors
    ///
    /// See [`Finder::find`].
    pub fn find(&self, css: &str) -> EsperarResult<Elements> {
        self.finder().find(css)
    }

    /// All elements matching an XPath
    ///
    /// # Errors
    ///
    /// See [`Finder::findx`].
    pub fn findx(&self, xpath: &str) -> EsperarResult<Elements> {
        self.finder().findx(xpath)
    }

    // =========================================================================
    // SESSION READS AND SCRIPTING
    // =========================================================================

    /// Current document title
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn title(&self) -> EsperarResult<String> {
        self.record("title() - get the current page title");
        self.backend().session_property("title")
    }

    /// Current URL
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn url(&self) -> EsperarResult<String> {
        self.record("url() - get the current page url");
        self.backend().session_property("url")
    }

    /// Evaluate a document-level script
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn execute_script(&self, script: &str, args: &[ScriptValue]) -> EsperarResult<ScriptValue> {
        self.record(&format!("execute_script() - {script}"));
        self.backend().evaluate_script(None, script, args)
    }

    /// Navigate to `url`
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn visit(&self, url: &str) -> EsperarResult<&Self> {
        self.record(&format!("visit() - visit page: {url}"));
        self.backend()
            .evaluate_script(None, script::VISIT, &[ScriptValue::from(url)])?;
        Ok(self)
    }

    /// Move `pages` entries through history.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `pages` is zero; backend errors otherwise.
    pub fn go(&self, direction: Direction, pages: u32) -> EsperarResult<&Self> {
        if pages == 0 {
            return Err(crate::result::EsperarError::invalid_argument(
                "go() needs at least one page",
            ));
        }
        let steps = f64::from(pages);
        let delta = match direction {
            Direction::Back => -steps,
            Direction::Forward => steps,
        };
        self.record(&format!("go() - go {direction:?} {pages} page(s) in history"));
        self.backend()
            .evaluate_script(None, script::HISTORY_GO, &[ScriptValue::Number(delta)])?;
        Ok(self)
    }

    /// Reload the current page
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn reload(&self) -> EsperarResult<&Self> {
        self.record("reload() - reload the current page");
        self.backend().evaluate_script(None, script::RELOAD, &[])?;
        Ok(self)
    }

    /// Scroll the window to a position
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn scroll_to(&self, x: i32, y: i32) -> EsperarResult<&Self> {
        self.record(&format!("scroll_to() - scroll to ({x}, {y})"));
        self.backend().evaluate_script(
            None,
            script::SCROLL_TO,
            &[ScriptValue::from(x), ScriptValue::from(y)],
        )?;
        Ok(self)
    }

    // =========================================================================
    // COOKIES AND WINDOW
    // =========================================================================

    /// Every cookie visible to the current document
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get_all_cookies(&self) -> EsperarResult<Vec<Cookie>> {
        self.record("get_all_cookies() - get all cookies visible to this page");
        self.cookie_jar()
    }

    /// Cookie by name, `None` when absent
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get_cookie(&self, name: &str) -> EsperarResult<Option<Cookie>> {
        self.record(&format!("get_cookie() - get cookie with name: {name}"));
        Ok(self.cookie_jar()?.into_iter().find(|c| c.name == name))
    }

    /// Add or replace a cookie
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty name or one containing `=` or `;`;
    /// backend errors otherwise.
    pub fn set_cookie(&self, cookie: &Cookie) -> EsperarResult<&Self> {
        if cookie.name.is_empty() || cookie.name.contains(['=', ';']) {
            return Err(crate::result::EsperarError::invalid_argument(format!(
                "invalid cookie name `{}`",
                cookie.name
            )));
        }
        self.record(&format!("set_cookie() - set cookie: {}", cookie.name));
        self.backend().evaluate_script(
            None,
            script::SET_COOKIE,
            &[ScriptValue::from(cookie.assignment())],
        )?;
        Ok(self)
    }

    /// Expire a cookie; a no-op if it does not exist
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn delete_cookie(&self, name: &str) -> EsperarResult<&Self> {
        self.record(&format!("delete_cookie() - delete cookie: {name}"));
        self.expire(name)?;
        Ok(self)
    }

    /// Expire every cookie visible to the current document
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn delete_all_cookies(&self) -> EsperarResult<&Self> {
        self.record("delete_all_cookies() - delete all cookies");
        for cookie in self.cookie_jar()? {
            self.expire(&cookie.name)?;
        }
        Ok(self)
    }

    /// Outer size of the browser window
    ///
    /// # Errors
    ///
    /// `Script` when the backend reports something other than a
    /// non-negative number.
    pub fn window_size(&self) -> EsperarResult<WindowSize> {
        self.record("window_size() - get the current window size");
        Ok(WindowSize {
            width: self.pixels(script::WINDOW_WIDTH)?,
            height: self.pixels(script::WINDOW_HEIGHT)?,
        })
    }

    fn cookie_jar(&self) -> EsperarResult<Vec<Cookie>> {
        let jar = self.backend().evaluate_script(None, script::COOKIES, &[])?;
        Ok(jar.as_text().map(Cookie::parse_jar).unwrap_or_default())
    }

    fn expire(&self, name: &str) -> EsperarResult<()> {
        let assignment = format!("{name}=; expires=Thu, 01 Jan 1970 00:00:00 GMT");
        self.backend()
            .evaluate_script(None, script::SET_COOKIE, &[ScriptValue::from(assignment)])?;
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn pixels(&self, source: &str) -> EsperarResult<u32> {
        match self.backend().evaluate_script(None, source, &[])? {
            ScriptValue::Number(n) if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) => {
                Ok(n.round() as u32)
            }
            other => Err(crate::result::EsperarError::script(format!(
                "expected a pixel count from `{source}`, got {other}"
            ))),
        }
    }

    // =========================================================================
    // WAITING AND CONDITIONS
    // =========================================================================

    /// Waiter over this session with a timeout override.
    ///
    /// Escape hatch for application-specific conditions.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Waiter<'_, Self> {
        self.wait_with(self.config().clone().with_timeout(timeout))
    }

    /// Waiter over this session with full control of the config
    #[must_use]
    pub fn wait_with(&self, config: WaitConfig) -> Waiter<'_, Self> {
        Waiter::new(self, config, self.log())
    }

    /// Session-level conditions
    #[must_use]
    pub fn should(&self) -> SessionShould<'_> {
        SessionShould::new(self)
    }
}

// =============================================================================
// STRUCTURED WAITS
// =============================================================================

impl Waiter<'_, Session> {
    /// Poll until `predicate` yields an element reference and wrap it as a
    /// handle.
    ///
    /// The handle has no locator, so [`ElementHandle::refresh`] reports
    /// `NotResolvable`.
    ///
    /// # Errors
    ///
    /// Same as [`Waiter::until`].
    pub fn until_element<F>(&self, mut predicate: F, message: &str) -> EsperarResult<ElementHandle>
    where
        F: FnMut(&Session) -> EsperarResult<ElementRef>,
    {
        let element = self.until(|session| predicate(session), message)?;
        Ok(ElementHandle::derived(self.target().clone(), element, "wait()"))
    }

    /// Poll until `predicate` yields a non-empty list of references and wrap
    /// them as a collection
    ///
    /// # Errors
    ///
    /// Same as [`Waiter::until`].
    pub fn until_elements<F>(&self, mut predicate: F, message: &str) -> EsperarResult<Elements>
    where
        F: FnMut(&Session) -> EsperarResult<Vec<ElementRef>>,
    {
        let refs = self.until(|session| predicate(session), message)?;
        Ok(Elements::derived(self.target().clone(), refs, "wait()"))
    }
}
