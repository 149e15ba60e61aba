//! Conditions on a single element.

use super::{text_contains, text_matches, Condition, Polarity, DETACHED};
use crate::element::ElementHandle;
use crate::result::{ErrorKind, EsperarResult};
use crate::session::Session;
use crate::wait::{Truthy, WaitConfig};
use std::time::Duration;

/// Visibility as a word, treating a stale reference as detached
fn visibility(element: &ElementHandle) -> EsperarResult<String> {
    match element.is_displayed() {
        Ok(true) => Ok("visible".to_string()),
        Ok(false) => Ok("hidden".to_string()),
        Err(e) if e.kind() == ErrorKind::StaleElement => Ok(DETACHED.to_string()),
        Err(e) => Err(e),
    }
}

fn flag(value: bool, yes: &str, no: &str) -> String {
    (if value { yes } else { no }).to_string()
}

fn attr_text(element: &ElementHandle, name: &str) -> EsperarResult<Option<String>> {
    Ok(element.attribute(name)?.map(|v| v.to_string()))
}

/// Builder for conditions on an [`ElementHandle`]
#[derive(Debug)]
pub struct ElementShould<'a> {
    element: &'a ElementHandle,
    config: WaitConfig,
}

impl<'a> ElementShould<'a> {
    pub(crate) fn new(element: &'a ElementHandle) -> Self {
        Self {
            element,
            config: element.session().config().clone(),
        }
    }

    /// Override the timeout for this condition
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Tolerate an additional error kind while polling
    #[must_use]
    pub fn tolerating(mut self, kind: ErrorKind) -> Self {
        self.config = self.config.tolerate(kind);
        self
    }

    fn run<R: Truthy>(&self, condition: Condition<'_, ElementHandle, R>) -> EsperarResult<R::Output> {
        condition.evaluate(self.element, &self.config, self.element.session().log())
    }

    fn pass(self, condition: Condition<'_, ElementHandle, bool>) -> EsperarResult<&'a ElementHandle> {
        self.run(condition)?;
        Ok(self.element)
    }

    /// Displayed and enabled
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_clickable(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_clickable",
            Polarity::Positive,
            "clickable",
            |e: &ElementHandle| Ok(e.is_displayed()? && e.is_enabled()?),
            |e: &ElementHandle| {
                Ok(format!(
                    "{}, {}",
                    visibility(e)?,
                    flag(e.is_enabled()?, "enabled", "disabled")
                ))
            },
        ))
    }

    /// Displayed
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_visible(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_visible",
            Polarity::Positive,
            "visible",
            |e: &ElementHandle| e.is_displayed(),
            visibility,
        ))
    }

    /// Attached but not displayed.
    ///
    /// A detached element never satisfies this.
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_hidden(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_hidden",
            Polarity::Positive,
            "hidden",
            |e: &ElementHandle| match e.is_displayed() {
                Ok(displayed) => Ok(!displayed),
                Err(err) if err.kind() == ErrorKind::StaleElement => Ok(false),
                Err(err) => Err(err),
            },
            visibility,
        ))
    }

    /// Enabled
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_enabled(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_enabled",
            Polarity::Positive,
            "enabled",
            |e: &ElementHandle| e.is_enabled(),
            |e: &ElementHandle| Ok(flag(e.is_enabled()?, "enabled", "disabled")),
        ))
    }

    /// Disabled
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_disabled(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_disabled",
            Polarity::Positive,
            "disabled",
            |e: &ElementHandle| Ok(!e.is_enabled()?),
            |e: &ElementHandle| Ok(flag(e.is_enabled()?, "enabled", "disabled")),
        ))
    }

    /// Checked
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_checked(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_checked",
            Polarity::Positive,
            "checked",
            |e: &ElementHandle| e.is_checked(),
            |e: &ElementHandle| Ok(flag(e.is_checked()?, "checked", "unchecked")),
        ))
    }

    /// Not checked
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_be_checked(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "not_be_checked",
            Polarity::Negative,
            "unchecked",
            |e: &ElementHandle| Ok(!e.is_checked()?),
            |e: &ElementHandle| Ok(flag(e.is_checked()?, "checked", "unchecked")),
        ))
    }

    /// Selected
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_selected(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_selected",
            Polarity::Positive,
            "selected",
            |e: &ElementHandle| e.is_selected(),
            |e: &ElementHandle| Ok(flag(e.is_selected()?, "selected", "not selected")),
        ))
    }

    /// Has focus
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_focused(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "be_focused",
            Polarity::Positive,
            "focused",
            |e: &ElementHandle| e.is_focused(),
            |e: &ElementHandle| Ok(flag(e.is_focused()?, "focused", "not focused")),
        ))
    }

    /// Does not have focus
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_be_focused(self) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "not_be_focused",
            Polarity::Negative,
            "not focused",
            |e: &ElementHandle| Ok(!e.is_focused()?),
            |e: &ElementHandle| Ok(flag(e.is_focused()?, "focused", "not focused")),
        ))
    }

    /// Text equals `expected`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_text(
        self,
        expected: &str,
        case_sensitive: bool,
        trim: bool,
    ) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "have_text",
            Polarity::Positive,
            expected,
            move |e: &ElementHandle| Ok(text_matches(&e.text()?, expected, case_sensitive, trim)),
            |e: &ElementHandle| e.text(),
        ))
    }

    /// Text contains `expected`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn contain_text(self, expected: &str, case_sensitive: bool) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "contain_text",
            Polarity::Positive,
            expected,
            move |e: &ElementHandle| Ok(text_contains(&e.text()?, expected, case_sensitive)),
            |e: &ElementHandle| e.text(),
        ))
    }

    /// Text differs from `unexpected`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_have_text(self, unexpected: &str) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "not_have_text",
            Polarity::Negative,
            unexpected,
            move |e: &ElementHandle| Ok(e.text()? != unexpected),
            |e: &ElementHandle| e.text(),
        ))
    }

    /// Attribute `name` equals `value`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_attr(self, name: &str, value: &str) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "have_attr",
            Polarity::Positive,
            format!("{name}={value}"),
            move |e: &ElementHandle| Ok(attr_text(e, name)?.as_deref() == Some(value)),
            move |e: &ElementHandle| {
                Ok(attr_text(e, name)?.map_or_else(|| format!("{name} absent"), |v| format!("{name}={v}")))
            },
        ))
    }

    /// Attribute `name` is absent, or differs from `value` when given
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_have_attr(self, name: &str, value: Option<&str>) -> EsperarResult<&'a ElementHandle> {
        let expected = value.map_or_else(|| format!("{name} absent"), |v| format!("{name}!={v}"));
        self.pass(Condition::new(
            "not_have_attr",
            Polarity::Negative,
            expected,
            move |e: &ElementHandle| {
                let actual = attr_text(e, name)?;
                Ok(match value {
                    None => actual.is_none(),
                    Some(v) => actual.as_deref() != Some(v),
                })
            },
            move |e: &ElementHandle| {
                Ok(attr_text(e, name)?.map_or_else(|| format!("{name} absent"), |v| format!("{name}={v}")))
            },
        ))
    }

    /// DOM property `name` renders as `value`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_prop(self, name: &str, value: &str) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "have_prop",
            Polarity::Positive,
            format!("{name}={value}"),
            move |e: &ElementHandle| Ok(e.property(name)?.to_string() == value),
            move |e: &ElementHandle| Ok(format!("{name}={}", e.property(name)?)),
        ))
    }

    /// `value` property equals `value`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_value(self, value: &str) -> EsperarResult<&'a ElementHandle> {
        self.pass(Condition::new(
            "have_value",
            Polarity::Positive,
            value,
            move |e: &ElementHandle| Ok(e.property("value")?.to_string() == value),
            |e: &ElementHandle| Ok(e.property("value")?.to_string()),
        ))
    }

    /// Not displayed, or gone from the document.
    ///
    /// Returns the owning session since the element is no longer useful.
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn disappear(self) -> EsperarResult<&'a Session> {
        self.run(Condition::new(
            "disappear",
            Polarity::Negative,
            "invisible or detached",
            |e: &ElementHandle| match e.is_displayed() {
                Ok(displayed) => Ok(!displayed),
                Err(err) if matches!(err.kind(), ErrorKind::StaleElement | ErrorKind::NotFound) => {
                    Ok(true)
                }
                Err(err) => Err(err),
            },
            visibility,
        ))?;
        Ok(self.element.session())
    }
}
