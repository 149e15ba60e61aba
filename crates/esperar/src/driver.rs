//! Backend - Abstract Automation Capability Interface
//!
//! Everything esperar knows about the remote document goes through the
//! [`Backend`] trait. The trait is deliberately narrow: find-one, find-many,
//! a handful of reads, a single action entry point, script evaluation and
//! session-level properties.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Session / ElementHandle / should()                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Backend (trait, synchronous, Send + Sync)                  │
//! │                                                              │
//! │  ┌────────────────────┐      ┌─────────────────────────┐     │
//! │  │  WebDriver client  │      │  MockBackend            │     │
//! │  │  (out of crate)    │      │  (in-memory DOM, tests) │     │
//! │  └────────────────────┘      └─────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Genchi Genbutsu**: the trait lets the same test code run against a real
//!   browser session or the in-memory [`MockBackend`](crate::mock::MockBackend)

use crate::locator::Strategy;
use crate::result::EsperarResult;
use crate::wait::Truthy;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ELEMENT REFERENCES
// =============================================================================

/// Opaque backend reference to one node.
///
/// The id is whatever the backend hands out (a WebDriver element id, a mock
/// node index). esperar never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Backend-assigned identifier
    pub id: String,
}

impl ElementRef {
    /// Wrap a backend id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<element {}>", self.id)
    }
}

impl Truthy for ElementRef {
    type Output = Self;

    fn truthy(self) -> Option<Self> {
        Some(self)
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// Attribute value as reported by the backend.
///
/// Boolean attributes (`checked`, `disabled`, ...) come back as `Bool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    /// String attribute
    Text(String),
    /// Boolean attribute
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Value crossing the script-evaluation boundary, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    /// `null` / `undefined`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    Text(String),
    /// Single node
    Element(ElementRef),
    /// Node list
    Elements(Vec<ElementRef>),
}

impl ScriptValue {
    /// JavaScript-style truthiness for booleans, `false` otherwise
    #[must_use]
    pub const fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Text content, if this is a string
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is `Null`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Element(e) => write!(f, "{e}"),
            Self::Elements(list) => write!(f, "[{} element(s)]", list.len()),
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<ElementRef> for ScriptValue {
    fn from(value: ElementRef) -> Self {
        Self::Element(value)
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Side-effecting interaction dispatched through [`Backend::perform_action`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Left click
    Click,
    /// Double click
    DoubleClick,
    /// Context click
    RightClick,
    /// Send keystrokes
    TypeText(String),
    /// Clear an editable value
    Clear,
    /// Submit the enclosing form
    Submit,
    /// Move the pointer over the element
    Hover,
    /// Drag the element onto another one
    DragTo(ElementRef),
}

impl Action {
    /// Method-style name used in step events
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "double_click",
            Self::RightClick => "right_click",
            Self::TypeText(_) => "type",
            Self::Clear => "clear",
            Self::Submit => "submit",
            Self::Hover => "hover",
            Self::DragTo(_) => "drag_to",
        }
    }
}

// =============================================================================
// SCRIPTS
// =============================================================================

/// Scripts evaluated through [`Backend::evaluate_script`].
///
/// When a scope element is passed it is bound to `arguments[0]` and the extra
/// arguments follow it.
pub mod script {
    /// Parent node of the scope element
    pub const PARENT: &str = "return arguments[0].parentNode;";
    /// Element children of the scope element
    pub const CHILDREN: &str = "return arguments[0].children;";
    /// Element siblings of the scope element, excluding itself
    pub const SIBLINGS: &str = "return Array.from(arguments[0].parentNode.children).filter(e => e !== arguments[0]);";
    /// Lower-cased tag name
    pub const TAG_NAME: &str = "return arguments[0].tagName.toLowerCase();";
    /// Named DOM property, `arguments[1]` is the property name
    pub const PROPERTY: &str = "return arguments[0][arguments[1]];";
    /// Whether the scope element has focus
    pub const IS_FOCUSED: &str = "return arguments[0] === document.activeElement;";
    /// Give the scope element focus
    pub const FOCUS: &str = "arguments[0].focus();";
    /// Scroll the scope element into view
    pub const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView(true);";
    /// Navigate to the url in `arguments[0]`
    pub const VISIT: &str = "window.location.href = arguments[0];";
    /// Move through history by `arguments[0]` steps
    pub const HISTORY_GO: &str = "window.history.go(arguments[0]);";
    /// Reload the current page
    pub const RELOAD: &str = "window.location.reload();";
    /// Scroll the window to (`arguments[0]`, `arguments[1]`)
    pub const SCROLL_TO: &str = "window.scrollTo(arguments[0], arguments[1]);";
    /// `name=value` pairs of the current document, `; `-separated
    pub const COOKIES: &str = "return document.cookie;";
    /// Write the cookie string in `arguments[0]`
    pub const SET_COOKIE: &str = "document.cookie = arguments[0];";
    /// Outer width of the browser window
    pub const WINDOW_WIDTH: &str = "return window.outerWidth;";
    /// Outer height of the browser window
    pub const WINDOW_HEIGHT: &str = "return window.outerHeight;";
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// Capability interface of an already-connected automation session.
///
/// Calls are synchronous round-trips. Implementations own their own
/// synchronization; esperar never issues overlapping calls from one session.
pub trait Backend: Send + Sync {
    /// Find the first node matching `selector` under `scope` (or the document).
    ///
    /// Fails with `NotFound` when nothing matches.
    fn find_one(
        &self,
        scope: Option<&ElementRef>,
        strategy: Strategy,
        selector: &str,
    ) -> EsperarResult<ElementRef>;

    /// Find all matching nodes; zero matches is an empty vector, not an error
    fn find_many(
        &self,
        scope: Option<&ElementRef>,
        strategy: Strategy,
        selector: &str,
    ) -> EsperarResult<Vec<ElementRef>>;

    /// Rendered text of the node
    fn read_text(&self, element: &ElementRef) -> EsperarResult<String>;

    /// Attribute value, `None` when absent
    fn read_attribute(&self, element: &ElementRef, name: &str) -> EsperarResult<Option<AttrValue>>;

    /// Whether the node is rendered visibly
    fn is_displayed(&self, element: &ElementRef) -> EsperarResult<bool>;

    /// Whether the node accepts interaction
    fn is_enabled(&self, element: &ElementRef) -> EsperarResult<bool>;

    /// Perform a side-effecting interaction
    fn perform_action(&self, element: &ElementRef, action: Action) -> EsperarResult<()>;

    /// Evaluate a script, binding `scope` to `arguments[0]` when given
    fn evaluate_script(
        &self,
        scope: Option<&ElementRef>,
        script: &str,
        args: &[ScriptValue],
    ) -> EsperarResult<ScriptValue>;

    /// Session-level property such as `title` or `url`
    fn session_property(&self, name: &str) -> EsperarResult<String>;
}

// =============================================================================
// TESTS
// =============================================================================
