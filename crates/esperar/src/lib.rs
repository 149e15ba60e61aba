//! Esperar: Auto-Waiting Queries and Assertions for Browser Sessions
//!
//! Esperar (Spanish: "to wait") sits between a test and a remote browser
//! session. Every query retries until its target appears, every element
//! handle remembers how it was found so it can be re-resolved after the page
//! re-renders, and every `should()` condition polls until it holds or its
//! timeout expires with an `Expected ... - Actual ...` failure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ESPERAR Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Session    │    │ Finder /   │    │ Backend    │            │
//! │   │ + should() │───►│ Waiter     │───►│ (driver or │            │
//! │   │            │    │            │    │  mock)     │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use esperar::mock::{MockBackend, NodeSpec};
//! use esperar::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mock = Arc::new(MockBackend::new());
//! mock.edit(|dom| {
//!     let body = dom.body();
//!     dom.append(body, NodeSpec::new("h1").id("greeting").text("Hi"));
//! });
//! mock.schedule(Duration::from_millis(50), |dom| {
//!     if let Some(h1) = dom.by_id("greeting") {
//!         dom.set_text(h1, "Hello");
//!     }
//! });
//!
//! let session = Session::with_null_log(mock, WaitConfig::new(Duration::from_secs(1)));
//! session
//!     .get("#greeting")
//!     .unwrap()
//!     .should()
//!     .have_text("Hello", true, true)
//!     .unwrap();
//! ```

#![warn(missing_docs)]

#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
mod assertion;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod config;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
mod driver;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
mod element;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod locator;
mod log;
mod result;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod session;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod wait;

/// In-memory backend for deterministic tests
///
/// Drives the whole crate without a browser: a mutable document tree,
/// mutations scheduled on a clock, and call accounting.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]
pub mod mock;

pub use assertion::{
    AssertionFailure, Condition, ElementShould, ElementsShould, Polarity, SessionShould,
    DETACHED, UNAVAILABLE,
};
pub use config::{LoggingConfig, SessionConfig};
pub use driver::{script, Action, AttrValue, Backend, ElementRef, ScriptValue};
pub use element::{ElementHandle, Elements, Origin};
pub use locator::{Finder, Locator, Scope, Strategy};
pub use log::{
    init_json_tracing, init_tracing, EventLog, MemoryLog, NullLog, TracingLog, LOG_TARGET,
};
pub use result::{ErrorKind, EsperarError, EsperarResult};
pub use session::{Cookie, Direction, Session, WindowSize};
pub use wait::{
    wait_until, Truthy, WaitConfig, WaitResult, Waiter, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::{ElementShould, ElementsShould, SessionShould};
    pub use super::driver::{Backend, ElementRef, ScriptValue};
    pub use super::element::{ElementHandle, Elements};
    pub use super::locator::{Locator, Strategy};
    pub use super::result::{ErrorKind, EsperarError, EsperarResult};
    pub use super::session::{Cookie, Direction, Session};
    pub use super::wait::WaitConfig;
}
