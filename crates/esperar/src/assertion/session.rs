//! Conditions on the session: title, URL and absence of nodes.

use super::{Condition, Polarity};
use crate::locator::{Locator, Strategy};
use crate::result::{ErrorKind, EsperarResult};
use crate::session::Session;
use crate::wait::WaitConfig;
use std::time::Duration;

/// Builder for conditions on a [`Session`]
#[derive(Debug)]
pub struct SessionShould<'a> {
    session: &'a Session,
    config: WaitConfig,
}

impl<'a> SessionShould<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self {
            session,
            config: session.config().clone(),
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

    fn pass(self, condition: Condition<'_, Session, bool>) -> EsperarResult<&'a Session> {
        condition.evaluate(self.session, &self.config, self.session.log())?;
        Ok(self.session)
    }

    fn property_condition(
        self,
        name: &'static str,
        property: &'static str,
        expected: &str,
        contains: bool,
    ) -> EsperarResult<&'a Session> {
        self.pass(Condition::new(
            name,
            Polarity::Positive,
            expected,
            move |s: &Session| {
                let actual = s.backend().session_property(property)?;
                Ok(if contains {
                    actual.contains(expected)
                } else {
                    actual == expected
                })
            },
            move |s: &Session| s.backend().session_property(property),
        ))
    }

    /// Title equals `title`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_title(self, title: &str) -> EsperarResult<&'a Session> {
        self.property_condition("have_title", "title", title, false)
    }

    /// Title contains `text`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn contain_title(self, text: &str) -> EsperarResult<&'a Session> {
        self.property_condition("contain_title", "title", text, true)
    }

    /// URL equals `url`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_url(self, url: &str) -> EsperarResult<&'a Session> {
        self.property_condition("have_url", "url", url, false)
    }

    /// URL contains `text`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn contain_url(self, text: &str) -> EsperarResult<&'a Session> {
        self.property_condition("contain_url", "url", text, true)
    }

    /// No element matches the CSS selector
    ///
    /// # Errors
    ///
    /// `InvalidSelector` immediately; `Assertion` on timeout.
    pub fn not_find(self, css: &str) -> EsperarResult<&'a Session> {
        self.absent("not_find", Locator::css(css))
    }

    /// No element matches the XPath
    ///
    /// # Errors
    ///
    /// `InvalidSelector` immediately; `Assertion` on timeout.
    pub fn not_findx(self, xpath: &str) -> EsperarResult<&'a Session> {
        self.absent("not_findx", Locator::xpath(xpath))
    }

    /// No element's text contains `text`
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_contain(self, text: &str) -> EsperarResult<&'a Session> {
        self.absent("not_contain", Locator::new(Strategy::TextContains, text))
    }

    fn absent(self, name: &'static str, locator: Locator) -> EsperarResult<&'a Session> {
        locator.validate()?;
        let expected = format!("no element with the {locator}");
        let matches = |s: &Session| {
            s.backend()
                .find_many(None, locator.strategy(), locator.selector())
                .map(|found| found.len())
        };
        self.pass(Condition::new(
            name,
            Polarity::Negative,
            expected,
            move |s: &Session| Ok(matches(s)? == 0),
            move |s: &Session| Ok(format!("{} element(s)", matches(s)?)),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, NodeSpec};
    use std::sync::Arc;

    fn fixture() -> (Arc<MockBackend>, Session) {
        let mock = Arc::new(MockBackend::new());
        mock.edit(|dom| {
            dom.set_title("Shop - Cart");
            let body = dom.body();
            dom.append(body, NodeSpec::new("div").class("spinner").text("Loading"));
        });
        let config = WaitConfig::new(Duration::from_millis(150))
            .with_poll_interval(Duration::from_millis(10));
        (mock.clone(), Session::with_null_log(mock, config))
    }

    #[test]
    fn test_title_conditions() {
        let (_mock, session) = fixture();
        session.should().have_title("Shop - Cart").unwrap();
        session.should().contain_title("Cart").unwrap();
        let err = session.should().have_title("Home").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected have_title `Home` - Actual `Shop - Cart`"
        );
    }

    #[test]
    fn test_url_conditions_after_visit() {
        let (_mock, session) = fixture();
        session.visit("https://shop.test/cart?id=1").unwrap();
        session.should().have_url("https://shop.test/cart?id=1").unwrap();
        session.should().contain_url("/cart").unwrap();
    }

    #[test]
    fn test_not_find_waits_for_removal() {
        let (mock, session) = fixture();
        assert!(session.should().not_find(".spinner").is_err());
        mock.schedule(Duration::from_millis(30), |dom| {
            for node in dom.by_class("spinner") {
                dom.remove(node);
            }
        });
        session
            .should()
            .timeout(Duration::from_secs(1))
            .not_find(".spinner")
            .unwrap()
            .should()
            .not_contain("Loading")
            .unwrap()
            .should()
            .not_findx("//div[@class='spinner']")
            .unwrap();
    }

    #[test]
    fn test_not_findx_rejects_bad_xpath() {
        let (_mock, session) = fixture();
        let err = session.should().not_findx("div").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSelector);
    }
}
