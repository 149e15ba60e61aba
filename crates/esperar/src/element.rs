//! Element handles.
//!
//! An [`ElementHandle`] wraps one resolved backend reference together with
//! how it was obtained. Located handles can be rebuilt with
//! [`ElementHandle::refresh`]; handles derived through script navigation
//! (`parent`, `children`, `siblings`) cannot, and say so.
//!
//! Actions never poll: a click is attempted exactly once and a backend
//! failure propagates unchanged.

use crate::assertion::{ElementShould, ElementsShould};
use crate::driver::{script, Action, AttrValue, ElementRef, ScriptValue};
use crate::locator::{Finder, Locator, Scope, Strategy};
use crate::result::{EsperarError, EsperarResult};
use crate::session::Session;
use std::fmt;
use std::ops::Index;
use std::time::Duration;

/// How a handle was obtained
#[derive(Debug, Clone)]
pub enum Origin {
    /// Resolved through a locator, re-resolvable
    Located {
        /// Locator used for the query
        locator: Locator,
        /// Scope the query ran in
        scope: Scope,
        /// Position in a find-many result, `None` for find-one
        index: Option<usize>,
    },
    /// Produced by script navigation, not re-resolvable
    Derived {
        /// Navigation that produced the handle, e.g. `parent()`
        via: &'static str,
    },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Located {
                locator,
                index: Some(index),
                ..
            } => write!(f, "{locator} [{index}]"),
            Self::Located { locator, .. } => write!(f, "{locator}"),
            Self::Derived { via } => write!(f, "element from {via}"),
        }
    }
}

// =============================================================================
// ELEMENT HANDLE
// =============================================================================

/// A resolved element plus the means to act on it and re-resolve it
#[derive(Debug, Clone)]
pub struct ElementHandle {
    session: Session,
    element: ElementRef,
    origin: Origin,
}

impl ElementHandle {
    pub(crate) fn located(
        session: Session,
        element: ElementRef,
        locator: Locator,
        scope: Scope,
        index: Option<usize>,
    ) -> Self {
        Self {
            session,
            element,
            origin: Origin::Located {
                locator,
                scope,
                index,
            },
        }
    }

    pub(crate) fn derived(session: Session, element: ElementRef, via: &'static str) -> Self {
        Self {
            session,
            element,
            origin: Origin::Derived { via },
        }
    }

    /// Backend reference
    #[must_use]
    pub const fn element_ref(&self) -> &ElementRef {
        &self.element
    }

    /// How this handle was obtained
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Locator, absent for derived handles
    #[must_use]
    pub const fn locator(&self) -> Option<&Locator> {
        match &self.origin {
            Origin::Located { locator, .. } => Some(locator),
            Origin::Derived { .. } => None,
        }
    }

    /// Whether [`ElementHandle::refresh`] can succeed
    #[must_use]
    pub const fn is_resolvable(&self) -> bool {
        matches!(self.origin, Origin::Located { .. })
    }

    /// Owning session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn describe(&self) -> String {
        self.origin.to_string()
    }

    /// Re-run the original query and return a new handle.
    ///
    /// A located parent scope is refreshed first. Items of a find-many
    /// result re-resolve to the same position in a fresh result.
    ///
    /// # Errors
    ///
    /// `NotResolvable` for derived handles; query errors otherwise.
    pub fn refresh(&self) -> EsperarResult<Self> {
        match &self.origin {
            Origin::Located {
                locator,
                scope,
                index,
            } => {
                let finder = Finder::new(
                    self.session.clone(),
                    scope.refresh()?,
                    self.session.config().clone(),
                );
                match index {
                    Some(index) => finder.locate_nth(locator.clone(), *index),
                    None => finder.locate(locator.clone()),
                }
            }
            Origin::Derived { via } => Err(EsperarError::NotResolvable {
                message: format!("element obtained from {via} has no locator"),
            }),
        }
    }

    // =========================================================================
    // SCOPED QUERIES
    // =========================================================================

    /// Finder scoped to this element with the default config
    #[must_use]
    pub fn finder(&self) -> Finder {
        Finder::new(
            self.session.clone(),
            Scope::Element(Box::new(self.clone())),
            self.session.config().clone(),
        )
    }

    /// Finder scoped to this element with a timeout override
    #[must_use]
    pub fn within(&self, timeout: Duration) -> Finder {
        self.finder().timeout(timeout)
    }

    /// First descendant matching a CSS selector
    ///
    /// # Errors
    ///
    /// See [`Finder::get`].
    pub fn get(&self, css: &str) -> EsperarResult<Self> {
        self.finder().get(css)
    }

    /// First descendant matching an XPath
    ///
    /// # Errors
    ///
    /// See [`Finder::getx`].
    pub fn getx(&self, xpath: &str) -> EsperarResult<Self> {
        self.finder().getx(xpath)
    }

    /// First descendant whose text contains `text`
    ///
    /// # Errors
    ///
    /// See [`Finder::contains`].
    pub fn contains(&self, text: &str) -> EsperarResult<Self> {
        self.finder().contains(text)
    }

    /// All descendants matching a CSS selector
    ///
    /// # Errors
    ///
    /// See [`Finder::find`].
    pub fn find(&self, css: &str) -> EsperarResult<Elements> {
        self.finder().find(css)
    }

    /// All descendants matching an XPath
    ///
    /// # Errors
    ///
    /// See [`Finder::findx`].
    pub fn findx(&self, xpath: &str) -> EsperarResult<Elements> {
        self.finder().findx(xpath)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Rendered text
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn text(&self) -> EsperarResult<String> {
        self.session.backend().read_text(&self.element)
    }

    /// Lower-cased tag name
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn tag_name(&self) -> EsperarResult<String> {
        let value = self.run_script(script::TAG_NAME, &[])?;
        Ok(value.as_text().unwrap_or_default().to_lowercase())
    }

    /// Attribute value, `None` when absent
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn attribute(&self, name: &str) -> EsperarResult<Option<AttrValue>> {
        self.session.backend().read_attribute(&self.element, name)
    }

    /// DOM property value
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn property(&self, name: &str) -> EsperarResult<ScriptValue> {
        self.run_script(script::PROPERTY, &[ScriptValue::from(name)])
    }

    /// Whether the element is rendered visibly
    ///
    /// # Errors
    ///
    /// Propagates backend errors, e.g. `StaleElement`.
    pub fn is_displayed(&self) -> EsperarResult<bool> {
        self.session.backend().is_displayed(&self.element)
    }

    /// Whether the element accepts interaction
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn is_enabled(&self) -> EsperarResult<bool> {
        self.session.backend().is_enabled(&self.element)
    }

    /// Whether a checkbox or radio is checked
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn is_checked(&self) -> EsperarResult<bool> {
        Ok(self.property("checked")?.as_bool())
    }

    /// Whether an option (or checkable input) is selected
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn is_selected(&self) -> EsperarResult<bool> {
        if self.property("selected")?.as_bool() {
            return Ok(true);
        }
        self.is_checked()
    }

    /// Whether the element has focus
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn is_focused(&self) -> EsperarResult<bool> {
        Ok(self.run_script(script::IS_FOCUSED, &[])?.as_bool())
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Click the element
    ///
    /// # Errors
    ///
    /// Propagates backend errors; never retried.
    pub fn click(&self) -> EsperarResult<&Self> {
        self.act(Action::Click)
    }

    /// Double click the element
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn double_click(&self) -> EsperarResult<&Self> {
        self.act(Action::DoubleClick)
    }

    /// Context click the element
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn right_click(&self) -> EsperarResult<&Self> {
        self.act(Action::RightClick)
    }

    /// Send keystrokes
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn type_text(&self, text: &str) -> EsperarResult<&Self> {
        self.act(Action::TypeText(text.to_string()))
    }

    /// Clear an editable value
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn clear(&self) -> EsperarResult<&Self> {
        self.act(Action::Clear)
    }

    /// Submit the enclosing form
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn submit(&self) -> EsperarResult<&Self> {
        self.act(Action::Submit)
    }

    /// Move the pointer over the element
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn hover(&self) -> EsperarResult<&Self> {
        self.act(Action::Hover)
    }

    /// Give the element focus
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn focus(&self) -> EsperarResult<&Self> {
        self.session.record(&format!("focus() - {}", self.describe()));
        self.run_script(script::FOCUS, &[])?;
        Ok(self)
    }

    /// Scroll the element into view
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn scroll_into_view(&self) -> EsperarResult<&Self> {
        self.session
            .record(&format!("scroll_into_view() - {}", self.describe()));
        self.run_script(script::SCROLL_INTO_VIEW, &[])?;
        Ok(self)
    }

    /// Drag onto the first element matching `css` in the document.
    ///
    /// # Errors
    ///
    /// Query errors for the target; backend errors for the drag.
    pub fn drag_to(&self, css: &str) -> EsperarResult<&Self> {
        let target = self.session.get(css)?;
        self.drag_to_element(&target)
    }

    /// Drag onto another element
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn drag_to_element(&self, target: &Self) -> EsperarResult<&Self> {
        self.act(Action::DragTo(target.element.clone()))
    }

    /// Check a checkbox or radio.
    ///
    /// With `allow_selected`, an already checked box is left alone.
    ///
    /// # Errors
    ///
    /// `Structural` when the element is not a checkbox or radio, or is
    /// already checked and `allow_selected` is false.
    pub fn check(&self, allow_selected: bool) -> EsperarResult<&Self> {
        self.session.record(&format!("check() - {}", self.describe()));
        self.ensure_checkable(&["checkbox", "radio"])?;
        if self.is_checked()? {
            if allow_selected {
                return Ok(self);
            }
            return Err(EsperarError::structural(format!(
                "{} is already selected",
                self.describe()
            )));
        }
        self.session.backend().perform_action(&self.element, Action::Click)?;
        Ok(self)
    }

    /// Uncheck a checkbox; a no-op if already unchecked
    ///
    /// # Errors
    ///
    /// `Structural` when the element is not a checkbox.
    pub fn uncheck(&self) -> EsperarResult<&Self> {
        self.session.record(&format!("uncheck() - {}", self.describe()));
        self.ensure_checkable(&["checkbox"])?;
        if self.is_checked()? {
            self.session.backend().perform_action(&self.element, Action::Click)?;
        }
        Ok(self)
    }

    /// Select the option at `index` of a `<select>`
    ///
    /// # Errors
    ///
    /// `Structural` on a non-select; `NotFound` when the index is out of range.
    pub fn select_by_index(&self, index: usize) -> EsperarResult<&Self> {
        self.session
            .record(&format!("select_by_index() - index {index} of {}", self.describe()));
        self.ensure_select()?;
        let options = self.options()?;
        let option = options.get(index).ok_or_else(|| {
            EsperarError::not_found(format!("option at index {index} in {}", self.describe()))
        })?;
        self.choose(option)
    }

    /// Select the option whose visible text equals `text`
    ///
    /// # Errors
    ///
    /// `Structural` on a non-select; `NotFound` when no option matches.
    pub fn select_by_text(&self, text: &str) -> EsperarResult<&Self> {
        self.session
            .record(&format!("select_by_text() - `{text}` in {}", self.describe()));
        self.ensure_select()?;
        let option = self.option_where(|o| Ok(o.text()?.trim() == text), &format!("text `{text}`"))?;
        self.choose(&option)
    }

    /// Select the option whose `value` attribute equals `value`
    ///
    /// # Errors
    ///
    /// `Structural` on a non-select; `NotFound` when no option matches.
    pub fn select_by_value(&self, value: &str) -> EsperarResult<&Self> {
        self.session
            .record(&format!("select_by_value() - `{value}` in {}", self.describe()));
        self.ensure_select()?;
        let option = self.option_where(
            |o| Ok(matches!(o.attribute("value")?, Some(AttrValue::Text(v)) if v == value)),
            &format!("value `{value}`"),
        )?;
        self.choose(&option)
    }

    /// Deselect the option whose visible text equals `text`
    ///
    /// # Errors
    ///
    /// `Structural` unless this is a `<select multiple>`; `NotFound` when no
    /// option matches.
    pub fn deselect_by_text(&self, text: &str) -> EsperarResult<&Self> {
        self.session
            .record(&format!("deselect_by_text() - `{text}` in {}", self.describe()));
        self.ensure_select()?;
        if self.attribute("multiple")?.is_none() {
            return Err(EsperarError::structural(format!(
                "cannot deselect in a single-select {}",
                self.describe()
            )));
        }
        let option = self.option_where(|o| Ok(o.text()?.trim() == text), &format!("text `{text}`"))?;
        if option.is_selected()? {
            self.session.backend().perform_action(&option.element, Action::Click)?;
        }
        Ok(self)
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Parent element
    ///
    /// # Errors
    ///
    /// `NotFound` at the document root; backend errors otherwise.
    pub fn parent(&self) -> EsperarResult<Self> {
        self.session.record(&format!("parent() - of {}", self.describe()));
        match self.run_script(script::PARENT, &[])? {
            ScriptValue::Element(element) => Ok(Self::derived(self.session.clone(), element, "parent()")),
            _ => Err(EsperarError::not_found(format!("parent of {}", self.describe()))),
        }
    }

    /// Element children
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn children(&self) -> EsperarResult<Elements> {
        self.session.record(&format!("children() - of {}", self.describe()));
        let value = self.run_script(script::CHILDREN, &[])?;
        Ok(self.derived_collection(value, "children()"))
    }

    /// Element siblings, excluding this element
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn siblings(&self) -> EsperarResult<Elements> {
        self.session.record(&format!("siblings() - of {}", self.describe()));
        let value = self.run_script(script::SIBLINGS, &[])?;
        Ok(self.derived_collection(value, "siblings()"))
    }

    /// Conditions on this element
    #[must_use]
    pub fn should(&self) -> ElementShould<'_> {
        ElementShould::new(self)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn act(&self, action: Action) -> EsperarResult<&Self> {
        self.session
            .record(&format!("{}() - {}", action.name(), self.describe()));
        self.session.backend().perform_action(&self.element, action)?;
        Ok(self)
    }

    fn run_script(&self, source: &str, args: &[ScriptValue]) -> EsperarResult<ScriptValue> {
        self.session
            .backend()
            .evaluate_script(Some(&self.element), source, args)
    }

    fn derived_collection(&self, value: ScriptValue, via: &'static str) -> Elements {
        let refs = match value {
            ScriptValue::Elements(refs) => refs,
            ScriptValue::Element(element) => vec![element],
            _ => Vec::new(),
        };
        Elements::derived(self.session.clone(), refs, via)
    }

    fn ensure_checkable(&self, types: &[&str]) -> EsperarResult<()> {
        let is_input = self.tag_name()? == "input";
        let kind = match self.attribute("type")? {
            Some(AttrValue::Text(kind)) => kind.to_lowercase(),
            _ => String::new(),
        };
        if is_input && types.contains(&kind.as_str()) {
            Ok(())
        } else {
            Err(EsperarError::structural(format!(
                "{} is not a {}",
                self.describe(),
                types.join(" or ")
            )))
        }
    }

    fn ensure_select(&self) -> EsperarResult<()> {
        if self.tag_name()? == "select" {
            Ok(())
        } else {
            Err(EsperarError::structural(format!(
                "{} is not a <select> element",
                self.describe()
            )))
        }
    }

    fn options(&self) -> EsperarResult<Vec<Self>> {
        let refs = self
            .session
            .backend()
            .find_many(Some(&self.element), Strategy::Css, "option")?;
        Ok(refs
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                Self::located(
                    self.session.clone(),
                    element,
                    Locator::css("option"),
                    Scope::Element(Box::new(self.clone())),
                    Some(index),
                )
            })
            .collect())
    }

    fn option_where<F>(&self, mut matches: F, what: &str) -> EsperarResult<Self>
    where
        F: FnMut(&Self) -> EsperarResult<bool>,
    {
        for option in self.options()? {
            if matches(&option)? {
                return Ok(option);
            }
        }
        Err(EsperarError::not_found(format!(
            "option with {what} in {}",
            self.describe()
        )))
    }

    fn choose(&self, option: &Self) -> EsperarResult<&Self> {
        if !option.is_selected()? {
            self.session.backend().perform_action(&option.element, Action::Click)?;
        }
        Ok(self)
    }
}

// =============================================================================
// ELEMENT COLLECTION
// =============================================================================

/// Ordered collection of handles plus its origin.
///
/// A located collection can be re-polled for a fresh count, which is what
/// the collection conditions do.
#[derive(Debug, Clone)]
pub struct Elements {
    session: Session,
    items: Vec<ElementHandle>,
    origin: Origin,
}

impl Elements {
    pub(crate) fn located(session: Session, refs: Vec<ElementRef>, locator: Locator, scope: Scope) -> Self {
        let items = refs
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                ElementHandle::located(
                    session.clone(),
                    element,
                    locator.clone(),
                    scope.clone(),
                    Some(index),
                )
            })
            .collect();
        Self {
            session,
            items,
            origin: Origin::Located {
                locator,
                scope,
                index: None,
            },
        }
    }

    pub(crate) fn derived(session: Session, refs: Vec<ElementRef>, via: &'static str) -> Self {
        let items = refs
            .into_iter()
            .map(|element| ElementHandle::derived(session.clone(), element, via))
            .collect();
        Self {
            session,
            items,
            origin: Origin::Derived { via },
        }
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ElementHandle> {
        self.items.get(index)
    }

    /// Remove and return the last handle
    pub fn pop(&mut self) -> Option<ElementHandle> {
        self.items.pop()
    }

    /// Iterate over the handles
    pub fn iter(&self) -> std::slice::Iter<'_, ElementHandle> {
        self.items.iter()
    }

    /// How the collection was obtained
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Owning session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn describe(&self) -> String {
        self.origin.to_string()
    }

    /// First element
    ///
    /// # Errors
    ///
    /// `EmptyCollection` when there are no elements.
    pub fn first(&self) -> EsperarResult<&ElementHandle> {
        self.items.first().ok_or_else(|| EsperarError::EmptyCollection {
            locator: self.describe(),
        })
    }

    /// Last element
    ///
    /// # Errors
    ///
    /// `EmptyCollection` when there are no elements.
    pub fn last(&self) -> EsperarResult<&ElementHandle> {
        self.items.last().ok_or_else(|| EsperarError::EmptyCollection {
            locator: self.describe(),
        })
    }

    /// Check every element
    ///
    /// # Errors
    ///
    /// Stops at the first element that fails to check.
    pub fn check_all(&self, allow_selected: bool) -> EsperarResult<&Self> {
        for element in &self.items {
            element.check(allow_selected)?;
        }
        Ok(self)
    }

    /// Uncheck every element
    ///
    /// # Errors
    ///
    /// Stops at the first element that fails to uncheck.
    pub fn uncheck_all(&self) -> EsperarResult<&Self> {
        for element in &self.items {
            element.uncheck()?;
        }
        Ok(self)
    }

    /// Whether every element is checked; `false` for an empty collection
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn are_checked(&self) -> EsperarResult<bool> {
        if self.items.is_empty() {
            return Ok(false);
        }
        for element in &self.items {
            if !element.is_checked()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Re-run the original query once, returning a possibly empty collection.
    ///
    /// A located parent scope is refreshed first.
    ///
    /// # Errors
    ///
    /// `NotResolvable` for derived collections; query errors otherwise.
    pub fn refresh(&self) -> EsperarResult<Self> {
        match &self.origin {
            Origin::Located { locator, scope, .. } => {
                Finder::new(self.session.clone(), scope.refresh()?, self.session.config().clone())
                    .at_least_one(false)
                    .locate_all(locator.clone())
            }
            Origin::Derived { via } => Err(EsperarError::NotResolvable {
                message: format!("collection obtained from {via} has no locator"),
            }),
        }
    }

    /// Fresh collection for located origins, a snapshot copy otherwise
    pub(crate) fn current(&self) -> EsperarResult<Self> {
        match self.origin {
            Origin::Located { .. } => self.refresh(),
            Origin::Derived { .. } => Ok(self.clone()),
        }
    }

    /// Conditions on this collection
    #[must_use]
    pub fn should(&self) -> ElementsShould<'_> {
        ElementsShould::new(self)
    }
}

impl Index<usize> for Elements {
    type Output = ElementHandle;

    fn index(&self, index: usize) -> &ElementHandle {
        &self.items[index]
    }
}

impl IntoIterator for Elements {
    type Item = ElementHandle;
    type IntoIter = std::vec::IntoIter<ElementHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Elements {
    type Item = &'a ElementHandle;
    type IntoIter = std::slice::Iter<'a, ElementHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// TESTS
// =============================================================================
