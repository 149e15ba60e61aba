//! Conditions on an element collection.
//!
//! Located collections re-run their query on every attempt, so a count that
//! changes after the collection was obtained is still observed. Derived
//! collections evaluate their snapshot.

use super::{Condition, Polarity};
use crate::element::Elements;
use crate::result::{ErrorKind, EsperarResult};
use crate::wait::{Truthy, WaitConfig};
use std::time::Duration;

fn count(elements: &Elements) -> EsperarResult<usize> {
    Ok(elements.current()?.len())
}

fn observe_count(elements: &Elements) -> EsperarResult<String> {
    Ok(count(elements)?.to_string())
}

/// Builder for conditions on [`Elements`]
#[derive(Debug)]
pub struct ElementsShould<'a> {
    elements: &'a Elements,
    config: WaitConfig,
}

impl<'a> ElementsShould<'a> {
    pub(crate) fn new(elements: &'a Elements) -> Self {
        Self {
            elements,
            config: elements.session().config().clone(),
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

    fn run<R: Truthy>(&self, condition: Condition<'_, Elements, R>) -> EsperarResult<R::Output> {
        condition.evaluate(self.elements, &self.config, self.elements.session().log())
    }

    fn pass(self, condition: Condition<'_, Elements, bool>) -> EsperarResult<&'a Elements> {
        self.run(condition)?;
        Ok(self.elements)
    }

    /// No elements
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_empty(self) -> EsperarResult<&'a Elements> {
        self.pass(Condition::new(
            "be_empty",
            Polarity::Positive,
            "0",
            |els: &Elements| Ok(count(els)? == 0),
            observe_count,
        ))
    }

    /// At least one element; returns the freshly resolved collection
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn not_be_empty(self) -> EsperarResult<Elements> {
        self.run(Condition::new(
            "not_be_empty",
            Polarity::Negative,
            "at least 1",
            |els: &Elements| {
                let fresh = els.current()?;
                Ok((!fresh.is_empty()).then_some(fresh))
            },
            observe_count,
        ))
    }

    /// Exactly `length` elements
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn have_length(self, length: usize) -> EsperarResult<&'a Elements> {
        self.pass(Condition::new(
            "have_length",
            Polarity::Positive,
            length.to_string(),
            move |els: &Elements| Ok(count(els)? == length),
            observe_count,
        ))
    }

    /// More than `length` elements
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_greater_than(self, length: usize) -> EsperarResult<&'a Elements> {
        self.pass(Condition::new(
            "be_greater_than",
            Polarity::Positive,
            format!("> {length}"),
            move |els: &Elements| Ok(count(els)? > length),
            observe_count,
        ))
    }

    /// Fewer than `length` elements
    ///
    /// # Errors
    ///
    /// `Assertion` on timeout.
    pub fn be_less_than(self, length: usize) -> EsperarResult<&'a Elements> {
        self.pass(Condition::new(
            "be_less_than",
            Polarity::Positive,
            format!("< {length}"),
            move |els: &Elements| Ok(count(els)? < length),
            observe_count,
        ))
    }
}
