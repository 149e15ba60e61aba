//! End-to-end scenarios against the mock backend.
//!
//! Each test builds its own document and session so timings never interfere.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use esperar::mock::{MockBackend, NodeSpec};
use esperar::prelude::*;
use esperar::{MemoryLog, SessionConfig};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fast(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout).with_poll_interval(Duration::from_millis(20))
}

fn page_with_add_button() -> (Arc<MockBackend>, Session) {
    let mock = Arc::new(MockBackend::new());
    let add = mock.edit(|dom| {
        let body = dom.body();
        dom.append(body, NodeSpec::new("ul").id("list"));
        dom.append(body, NodeSpec::new("button").id("add").text("Add"))
    });
    mock.on_click(add, Duration::from_millis(300), |dom| {
        if let Some(list) = dom.by_id("list") {
            dom.append(list, NodeSpec::new("li").class("item").text("new"));
        }
    });
    let session = Session::with_null_log(mock.clone(), fast(Duration::from_secs(1)));
    (mock, session)
}

// =============================================================================
// DELAYED CONTENT
// =============================================================================

mod delayed_content {
    use super::*;

    #[test]
    fn test_find_waits_for_delayed_items() {
        let (_mock, session) = page_with_add_button();
        session.get("#add").unwrap().click().unwrap();
        let items = session.within(Duration::from_secs(1)).find(".item").unwrap();
        items.should().have_length(1).unwrap();
    }

    #[test]
    fn test_find_times_out_before_items_arrive() {
        let (_mock, session) = page_with_add_button();
        session.get("#add").unwrap().click().unwrap();
        let err = session
            .within(Duration::from_millis(100))
            .find(".item")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_zero_timeout_surfaces_not_found() {
        let (_mock, session) = page_with_add_button();
        let err = session
            .within(Duration::ZERO)
            .get("#missing-element")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_get_waits_for_late_element() {
        let mock = Arc::new(MockBackend::new());
        mock.schedule(Duration::from_millis(500), |dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("div").id("late"));
        });
        let session = Session::with_null_log(mock, fast(Duration::from_secs(2)));
        let late = session.get("#late").unwrap();
        assert!(late.is_displayed().unwrap());
    }
}

// =============================================================================
// TEXT CONDITIONS
// =============================================================================

mod text_conditions {
    use super::*;

    fn greeting(delay: Duration) -> Session {
        let mock = Arc::new(MockBackend::new());
        mock.edit(|dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("h1").id("greeting").text("Hi"));
        });
        mock.schedule(delay, |dom| {
            if let Some(h1) = dom.by_id("greeting") {
                dom.set_text(h1, "Hello");
            }
        });
        Session::with_null_log(mock, fast(Duration::from_secs(1)))
    }

    #[test]
    fn test_have_text_after_change() {
        let session = greeting(Duration::from_millis(200));
        session
            .get("#greeting")
            .unwrap()
            .should()
            .have_text("Hello", true, true)
            .unwrap();
    }

    #[test]
    fn test_have_text_fails_with_expected_and_actual() {
        let session = greeting(Duration::from_millis(200));
        let err = session
            .get("#greeting")
            .unwrap()
            .should()
            .timeout(Duration::from_millis(100))
            .have_text("Hello", true, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
        let message = err.to_string();
        assert!(message.contains("Hello"), "{message}");
        assert!(message.contains("Hi"), "{message}");
    }
}

// =============================================================================
// VISIBILITY
// =============================================================================

mod visibility {
    use super::*;

    #[test]
    fn test_visible_and_hidden_are_exclusive() {
        let mock = Arc::new(MockBackend::new());
        let node = mock.edit(|dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("div").id("toast").text("Saved"))
        });
        let session = Session::with_null_log(mock.clone(), fast(Duration::from_millis(80)));
        let toast = session.get("#toast").unwrap();

        toast.should().be_visible().unwrap();
        assert!(toast.should().be_hidden().is_err());

        mock.edit(|dom| dom.set_displayed(node, false));
        toast.should().be_hidden().unwrap();
        assert!(toast.should().be_visible().is_err());
    }

    #[test]
    fn test_disappear_after_removal() {
        let mock = Arc::new(MockBackend::new());
        let node = mock.edit(|dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("div").class("spinner"))
        });
        mock.schedule(Duration::from_millis(50), move |dom| dom.remove(node));
        let session = Session::with_null_log(mock, fast(Duration::from_secs(1)));
        session
            .get(".spinner")
            .unwrap()
            .should()
            .disappear()
            .unwrap()
            .should()
            .not_find(".spinner")
            .unwrap();
    }
}

// =============================================================================
// RE-RESOLUTION
// =============================================================================

mod re_resolution {
    use super::*;

    fn rows() -> (Arc<MockBackend>, Session) {
        let mock = Arc::new(MockBackend::new());
        mock.edit(|dom| {
            let body = dom.body();
            let list = dom.append(body, NodeSpec::new("ul").id("rows"));
            for label in ["first", "second"] {
                let row = dom.append(list, NodeSpec::new("li").class("row"));
                dom.append(row, NodeSpec::new("span").text(label));
            }
        });
        let session = Session::with_null_log(mock.clone(), fast(Duration::from_millis(200)));
        (mock, session)
    }

    #[test]
    fn test_item_refresh_returns_same_position() {
        let (_mock, session) = rows();
        let rows = session.find(".row").unwrap();
        assert_eq!(rows[1].text().unwrap(), "second");
        assert_eq!(rows[1].refresh().unwrap().text().unwrap(), "second");
    }

    #[test]
    fn test_item_refresh_after_rerender() {
        let (mock, session) = rows();
        let rows = session.find(".row").unwrap();
        mock.edit(|dom| {
            let old = dom.by_id("rows").unwrap();
            dom.remove(old);
            let body = dom.body();
            let list = dom.append(body, NodeSpec::new("ul").id("rows"));
            dom.append(list, NodeSpec::new("li").class("row").text("first again"));
            dom.append(list, NodeSpec::new("li").class("row").text("second again"));
        });
        assert!(rows[1].text().is_err());
        let fresh = rows[1].refresh().unwrap();
        assert_eq!(fresh.text().unwrap(), "second again");
    }

    #[test]
    fn test_scope_from_item_refreshes_to_same_row() {
        let (_mock, session) = rows();
        let rows = session.find(".row").unwrap();
        let second = rows[1].get("span").unwrap();
        let fresh = second.refresh().unwrap();
        assert_eq!(fresh.text().unwrap(), "second");
        assert!(rows[1].contains("first").is_err());
    }
}

// =============================================================================
// POLLING BEHAVIOR
// =============================================================================

mod polling {
    use super::*;

    #[test]
    fn test_immediate_success_does_not_sleep() {
        let mock = Arc::new(MockBackend::new());
        mock.edit(|dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("p").id("ready"));
        });
        let config = WaitConfig::new(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(500));
        let session = Session::with_null_log(mock.clone(), config);

        let start = Instant::now();
        session.get("#ready").unwrap();
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_steps_are_logged() {
        let (mock, _session) = page_with_add_button();
        let log = Arc::new(MemoryLog::new());
        let session = Session::new(mock, fast(Duration::from_millis(60)), log.clone());

        session.get("#add").unwrap();
        assert!(session.should().have_title("Nope").is_err());

        assert!(log.contains("#add"));
        assert!(log.events().iter().any(|e| e.starts_with("FAILED")));
    }

    #[test]
    fn test_session_from_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esperar.json");
        std::fs::write(&path, r#"{"wait_time": 0.2, "poll_interval": 0.02}"#).unwrap();
        let config = SessionConfig::from_json_file(&path).unwrap();

        let session = Session::from_config(Arc::new(MockBackend::new()), &config).unwrap();
        assert_eq!(session.config().timeout(), Duration::from_millis(200));
        let err = session.get("#absent").unwrap_err();
        assert!(err.is_timeout());
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_text_locator_finds_exactly_one(text in "[a-zA-Z0-9][a-zA-Z0-9 ']{0,11}") {
        let mock = Arc::new(MockBackend::new());
        mock.edit(|dom| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("span").text(&format!("<{text}>")));
        });
        let session = Session::with_null_log(mock, WaitConfig::new(Duration::ZERO));
        let found = session.finder().locate_all(Locator::text(text.as_str())).unwrap();
        prop_assert_eq!(found.len(), 1);
    }

    #[test]
    fn prop_wait_config_from_seconds(timeout in 0.0f64..100.0, interval in 0.001f64..10.0) {
        let config = WaitConfig::from_secs_f64(timeout, interval).unwrap();
        prop_assert_eq!(config.timeout(), Duration::from_secs_f64(timeout));
        prop_assert_eq!(config.poll_interval(), Duration::from_secs_f64(interval));
        prop_assert!(config.validate().is_ok());
    }
}
