//! Mock Backend for Deterministic Testing
//!
//! [`MockBackend`] implements [`Backend`] over an in-memory [`Dom`]. Timing
//! scenarios are expressed as scheduled mutations that are applied lazily at
//! the start of every backend call, so no background thread is needed.
//!
//! ## Example
//!
//! ```rust
//! use esperar::mock::{MockBackend, NodeSpec};
//! use esperar::{Session, WaitConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mock = Arc::new(MockBackend::new());
//! let add = mock.edit(|dom| {
//!     let body = dom.body();
//!     dom.append(body, NodeSpec::new("button").id("add").text("Add"))
//! });
//! mock.on_click(add, Duration::from_millis(50), |dom| {
//!     let body = dom.body();
//!     dom.append(body, NodeSpec::new("li").class("item"));
//! });
//!
//! let session = Session::with_null_log(mock.clone(), WaitConfig::new(Duration::from_secs(1)));
//! session.get("#add").unwrap().click().unwrap();
//! session.find(".item").unwrap().should().have_length(1).unwrap();
//! ```

mod dom;
mod query;

pub use dom::{Dom, NodeId, NodeSpec};

use crate::driver::{script, Action, AttrValue, Backend, ElementRef, ScriptValue};
use crate::locator::{Locator, Strategy};
use crate::result::{EsperarError, EsperarResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const REF_PREFIX: &str = "mock-";

type Mutation = Box<dyn FnOnce(&mut Dom) + Send>;
type Handler = Arc<dyn Fn(&mut Dom) + Send + Sync>;

struct Scheduled {
    due: Instant,
    apply: Mutation,
}

struct ClickHandler {
    node: NodeId,
    delay: Duration,
    handler: Handler,
}

#[derive(Default)]
struct State {
    dom: Dom,
    scheduled: Vec<Scheduled>,
    click_handlers: Vec<ClickHandler>,
    script_results: HashMap<String, ScriptValue>,
    actions: Vec<(ElementRef, Action)>,
    calls: usize,
}

impl State {
    fn apply_due(&mut self) {
        let now = Instant::now();
        let (mut ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|s| s.due <= now);
        self.scheduled = pending;
        ready.sort_by_key(|s| s.due);
        for mutation in ready {
            (mutation.apply)(&mut self.dom);
        }
    }

    fn resolve(&self, element: &ElementRef) -> EsperarResult<NodeId> {
        let node = element
            .id
            .strip_prefix(REF_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
            .map(NodeId)
            .filter(|id| self.dom.contains_id(*id))
            .ok_or_else(|| EsperarError::Backend {
                message: format!("unknown element reference {element}"),
            })?;
        if self.dom.is_attached(node) {
            Ok(node)
        } else {
            Err(EsperarError::stale(format!(
                "{element} is no longer attached to the document"
            )))
        }
    }

    fn query(&self, scope: Option<&ElementRef>, strategy: Strategy, selector: &str) -> EsperarResult<Vec<NodeId>> {
        let scope = scope.map(|s| self.resolve(s)).transpose()?;
        match strategy {
            Strategy::Css => query::select_css(&self.dom, scope, selector),
            Strategy::XPath => query::select_xpath(&self.dom, scope, selector),
            Strategy::TextContains => {
                let xpath = Locator::text(selector).to_xpath().unwrap_or_default();
                let xpath = if scope.is_some() { format!(".{xpath}") } else { xpath };
                query::select_xpath(&self.dom, scope, &xpath)
            }
        }
    }

    fn interactable(&self, node: NodeId, element: &ElementRef) -> EsperarResult<()> {
        if !self.dom.is_displayed(node) {
            return Err(EsperarError::NotInteractable {
                message: format!("{element} is not displayed"),
            });
        }
        if !self.dom.node(node).enabled {
            return Err(EsperarError::NotInteractable {
                message: format!("{element} is disabled"),
            });
        }
        Ok(())
    }

    fn click(&mut self, node: NodeId) {
        let tag = self.dom.node(node).tag.clone();
        let kind = self.dom.node(node).attrs.get("type").cloned().unwrap_or_default();
        if tag == "input" && kind == "checkbox" {
            let checked = self.dom.node(node).checked;
            self.dom.set_checked(node, !checked);
        } else if tag == "input" && kind == "radio" {
            let name = self.dom.node(node).attrs.get("name").cloned();
            if let Some(name) = name {
                for other in self.dom.all() {
                    if self.dom.node(other).attrs.get("name") == Some(&name) {
                        self.dom.set_checked(other, false);
                    }
                }
            }
            self.dom.set_checked(node, true);
        } else if tag == "option" {
            self.pick_option(node);
        }
        self.dom.focused = Some(node);

        let now = Instant::now();
        for handler in self.click_handlers.iter().filter(|h| h.node == node) {
            let fire = Arc::clone(&handler.handler);
            self.scheduled.push(Scheduled {
                due: now + handler.delay,
                apply: Box::new(move |dom| fire(dom)),
            });
        }
    }

    fn pick_option(&mut self, option: NodeId) {
        let Some(select) = self.dom.ancestor_with_tag(option, "select") else {
            return;
        };
        if self.dom.node(select).attrs.contains_key("multiple") {
            let node = &mut self.dom.nodes[option.0];
            node.selected = !node.selected;
        } else {
            for other in self.dom.descendants(select) {
                self.dom.nodes[other.0].selected = other == option;
            }
        }
    }

    fn property(&self, node: NodeId, name: &str) -> ScriptValue {
        let n = self.dom.node(node);
        match name {
            "checked" => ScriptValue::Bool(n.checked),
            "selected" => ScriptValue::Bool(n.selected),
            "disabled" => ScriptValue::Bool(!n.enabled),
            "value" => ScriptValue::Text(
                if n.value.is_empty() {
                    n.attrs.get("value").cloned().unwrap_or_default()
                } else {
                    n.value.clone()
                },
            ),
            "tagName" => ScriptValue::Text(n.tag.to_uppercase()),
            "textContent" | "innerText" => ScriptValue::Text(self.dom.text_content(node)),
            "className" => ScriptValue::Text(n.attrs.get("class").cloned().unwrap_or_default()),
            "multiple" => ScriptValue::Bool(n.attrs.contains_key("multiple")),
            other => n
                .attrs
                .get(other)
                .map_or(ScriptValue::Null, |v| ScriptValue::Text(v.clone())),
        }
    }
}

/// In-memory [`Backend`] with scheduled mutations and call accounting
pub struct MockBackend {
    state: Mutex<State>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend over an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::with_dom(Dom::new())
    }

    /// Backend over a prepared document
    #[must_use]
    pub fn with_dom(dom: Dom) -> Self {
        Self {
            state: Mutex::new(State {
                dom,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a backend call and apply due mutations
    fn enter(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls += 1;
        state.apply_due();
        state
    }

    /// Edit the document directly; not counted as a backend call
    pub fn edit<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.lock().dom)
    }

    /// Apply `f` to the document once `delay` has elapsed
    pub fn schedule(&self, delay: Duration, f: impl FnOnce(&mut Dom) + Send + 'static) {
        self.lock().scheduled.push(Scheduled {
            due: Instant::now() + delay,
            apply: Box::new(f),
        });
    }

    /// Run `f` `delay` after every click on `node`
    pub fn on_click(&self, node: NodeId, delay: Duration, f: impl Fn(&mut Dom) + Send + Sync + 'static) {
        self.lock().click_handlers.push(ClickHandler {
            node,
            delay,
            handler: Arc::new(f),
        });
    }

    /// Canned result for a script the mock does not interpret
    pub fn on_script(&self, script: &str, result: ScriptValue) {
        self.lock()
            .script_results
            .insert(script.to_string(), result);
    }

    /// Number of backend calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Actions performed so far, oldest first
    #[must_use]
    pub fn actions(&self) -> Vec<(ElementRef, Action)> {
        self.lock().actions.clone()
    }

    /// Number of reloads requested
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.lock().dom.reloads
    }

    /// Reference the backend hands out for `node`
    #[must_use]
    pub fn element_ref(node: NodeId) -> ElementRef {
        ElementRef::new(format!("{REF_PREFIX}{}", node.0))
    }

    /// Node behind a reference, if it was issued by this mock
    #[must_use]
    pub fn node_of(&self, element: &ElementRef) -> Option<NodeId> {
        let state = self.lock();
        element
            .id
            .strip_prefix(REF_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
            .map(NodeId)
            .filter(|id| state.dom.contains_id(*id))
    }
}

fn scope_node(state: &State, scope: Option<&ElementRef>, source: &str) -> EsperarResult<NodeId> {
    let element = scope.ok_or_else(|| EsperarError::script(format!("`{source}` needs an element")))?;
    state.resolve(element)
}

fn element_or_null(node: Option<NodeId>) -> ScriptValue {
    node.map_or(ScriptValue::Null, |n| ScriptValue::Element(MockBackend::element_ref(n)))
}

fn elements(nodes: impl IntoIterator<Item = NodeId>) -> ScriptValue {
    ScriptValue::Elements(nodes.into_iter().map(MockBackend::element_ref).collect())
}

impl Backend for MockBackend {
    fn find_one(&self, scope: Option<&ElementRef>, strategy: Strategy, selector: &str) -> EsperarResult<ElementRef> {
        let state = self.enter();
        state
            .query(scope, strategy, selector)?
            .first()
            .map(|n| Self::element_ref(*n))
            .ok_or_else(|| EsperarError::not_found(format!("{} `{selector}`", strategy.label())))
    }

    fn find_many(
        &self,
        scope: Option<&ElementRef>,
        strategy: Strategy,
        selector: &str,
    ) -> EsperarResult<Vec<ElementRef>> {
        let state = self.enter();
        Ok(state
            .query(scope, strategy, selector)?
            .into_iter()
            .map(Self::element_ref)
            .collect())
    }

    fn read_text(&self, element: &ElementRef) -> EsperarResult<String> {
        let state = self.enter();
        let node = state.resolve(element)?;
        Ok(state.dom.text_content(node))
    }

    fn read_attribute(&self, element: &ElementRef, name: &str) -> EsperarResult<Option<AttrValue>> {
        let state = self.enter();
        let node = state.resolve(element)?;
        let n = state.dom.node(node);
        let flag = |on: bool| on.then_some(AttrValue::Bool(true));
        Ok(match name {
            "checked" => flag(n.checked),
            "selected" => flag(n.selected),
            "disabled" => flag(!n.enabled),
            "value" if !n.value.is_empty() => Some(AttrValue::Text(n.value.clone())),
            _ => n.attrs.get(name).map(|v| AttrValue::Text(v.clone())),
        })
    }

    fn is_displayed(&self, element: &ElementRef) -> EsperarResult<bool> {
        let state = self.enter();
        let node = state.resolve(element)?;
        Ok(state.dom.is_displayed(node))
    }

    fn is_enabled(&self, element: &ElementRef) -> EsperarResult<bool> {
        let state = self.enter();
        let node = state.resolve(element)?;
        Ok(state.dom.node(node).enabled)
    }

    fn perform_action(&self, element: &ElementRef, action: Action) -> EsperarResult<()> {
        let mut state = self.enter();
        let node = state.resolve(element)?;
        match &action {
            Action::Submit => {}
            Action::DragTo(target) => {
                state.interactable(node, element)?;
                state.resolve(target)?;
            }
            _ => state.interactable(node, element)?,
        }
        match &action {
            Action::Click => state.click(node),
            Action::TypeText(text) => {
                state.dom.nodes[node.0].value.push_str(text);
                state.dom.focused = Some(node);
            }
            Action::Clear => state.dom.set_value(node, ""),
            _ => {}
        }
        state.actions.push((element.clone(), action));
        Ok(())
    }

    fn evaluate_script(
        &self,
        scope: Option<&ElementRef>,
        source: &str,
        args: &[ScriptValue],
    ) -> EsperarResult<ScriptValue> {
        let mut state = self.enter();
        match source {
            script::PARENT => {
                let node = scope_node(&state, scope, source)?;
                Ok(element_or_null(state.dom.node(node).parent))
            }
            script::CHILDREN => {
                let node = scope_node(&state, scope, source)?;
                Ok(elements(state.dom.node(node).children.clone()))
            }
            script::SIBLINGS => {
                let node = scope_node(&state, scope, source)?;
                let siblings = state.dom.node(node).parent.map_or_else(Vec::new, |p| {
                    state
                        .dom
                        .node(p)
                        .children
                        .iter()
                        .copied()
                        .filter(|c| *c != node)
                        .collect()
                });
                Ok(elements(siblings))
            }
            script::TAG_NAME => {
                let node = scope_node(&state, scope, source)?;
                Ok(ScriptValue::Text(state.dom.node(node).tag.clone()))
            }
            script::PROPERTY => {
                let node = scope_node(&state, scope, source)?;
                let name = args.first().and_then(ScriptValue::as_text).ok_or_else(|| {
                    EsperarError::script("property lookup needs a property name")
                })?;
                Ok(state.property(node, name))
            }
            script::IS_FOCUSED => {
                let node = scope_node(&state, scope, source)?;
                Ok(ScriptValue::Bool(state.dom.focused == Some(node)))
            }
            script::FOCUS => {
                let node = scope_node(&state, scope, source)?;
                state.dom.focused = Some(node);
                Ok(ScriptValue::Null)
            }
            script::SCROLL_INTO_VIEW => {
                scope_node(&state, scope, source)?;
                Ok(ScriptValue::Null)
            }
            script::VISIT => {
                let url = args
                    .first()
                    .and_then(ScriptValue::as_text)
                    .ok_or_else(|| EsperarError::script("visit needs a url"))?
                    .to_string();
                let dom = &mut state.dom;
                dom.history.truncate(dom.position + 1);
                dom.history.push(url);
                dom.position = dom.history.len() - 1;
                Ok(ScriptValue::Null)
            }
            script::HISTORY_GO => {
                let delta = match args.first() {
                    Some(ScriptValue::Number(n)) => *n,
                    _ => return Err(EsperarError::script("history.go needs a number")),
                };
                #[allow(clippy::cast_possible_truncation)]
                let delta = delta.round() as i64;
                let dom = &mut state.dom;
                // out-of-range moves are ignored, like a browser at either end of history
                let target = i64::try_from(dom.position)
                    .ok()
                    .and_then(|p| p.checked_add(delta))
                    .and_then(|t| usize::try_from(t).ok())
                    .filter(|t| *t < dom.history.len());
                if let Some(target) = target {
                    dom.position = target;
                }
                Ok(ScriptValue::Null)
            }
            script::RELOAD => {
                state.dom.reloads += 1;
                Ok(ScriptValue::Null)
            }
            script::SCROLL_TO => Ok(ScriptValue::Null),
            script::COOKIES => {
                let cookies: Vec<String> = state
                    .dom
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                Ok(ScriptValue::Text(cookies.join("; ")))
            }
            script::SET_COOKIE => {
                let raw = args
                    .first()
                    .and_then(ScriptValue::as_text)
                    .ok_or_else(|| EsperarError::script("document.cookie needs a string"))?;
                write_cookie(&mut state.dom, raw);
                Ok(ScriptValue::Null)
            }
            script::WINDOW_WIDTH => Ok(ScriptValue::Number(f64::from(state.dom.window.0))),
            script::WINDOW_HEIGHT => Ok(ScriptValue::Number(f64::from(state.dom.window.1))),
            other => state
                .script_results
                .get(other)
                .cloned()
                .ok_or_else(|| EsperarError::script(format!("mock cannot evaluate `{other}`"))),
        }
    }

    fn session_property(&self, name: &str) -> EsperarResult<String> {
        let state = self.enter();
        match name {
            "title" => Ok(state.dom.title.clone()),
            "url" => Ok(state.dom.url().to_string()),
            other => Err(EsperarError::Backend {
                message: format!("unknown session property `{other}`"),
            }),
        }
    }
}

/// Apply a `document.cookie` assignment; an expiry in the past deletes
fn write_cookie(dom: &mut Dom, raw: &str) {
    let mut parts = raw.split(';').map(str::trim);
    let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
        return;
    };
    let expired = parts.any(|attr| {
        let attr = attr.to_ascii_lowercase();
        attr == "max-age=0" || (attr.starts_with("expires=") && attr.contains("1970"))
    });
    if expired {
        dom.cookies.remove(name.trim());
    } else {
        dom.cookies.insert(name.trim().to_string(), value.trim().to_string());
    }
}
