//! In-memory document tree used by [`MockBackend`](super::MockBackend).
//!
//! Nodes live in an arena and are never freed. Removing a node only detaches
//! it, so references to it turn stale exactly like a real browser's would.

use std::collections::BTreeMap;

/// Arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Builder describing a node to append
#[derive(Debug, Clone)]
pub struct NodeSpec {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    displayed: bool,
    enabled: bool,
    checked: bool,
    selected: bool,
    value: String,
}

impl NodeSpec {
    /// Visible, enabled node with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            displayed: true,
            enabled: true,
            checked: false,
            selected: false,
            value: String::new(),
        }
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        let classes = self.attrs.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the node's own text
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Set the editable value
    #[must_use]
    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// Not displayed
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Not enabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checked checkbox or radio
    #[must_use]
    pub const fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Selected option
    #[must_use]
    pub const fn selected(mut self) -> Self {
        self.selected = true;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) displayed: bool,
    pub(crate) enabled: bool,
    pub(crate) checked: bool,
    pub(crate) selected: bool,
    pub(crate) value: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    fn from_spec(spec: NodeSpec, parent: Option<NodeId>) -> Self {
        Self {
            tag: spec.tag,
            attrs: spec.attrs,
            text: spec.text,
            displayed: spec.displayed,
            enabled: spec.enabled,
            checked: spec.checked,
            selected: spec.selected,
            value: spec.value,
            parent,
            children: Vec::new(),
        }
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

/// Mutable document: tree, title, history and focus
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    pub(crate) title: String,
    pub(crate) history: Vec<String>,
    pub(crate) position: usize,
    pub(crate) focused: Option<NodeId>,
    pub(crate) reloads: usize,
    pub(crate) cookies: BTreeMap<String, String>,
    pub(crate) window: (u32, u32),
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Empty `<html><body></body></html>` document at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: vec![Node::from_spec(NodeSpec::new("html"), None)],
            root: NodeId(0),
            body: NodeId(0),
            title: String::new(),
            history: vec!["about:blank".to_string()],
            position: 0,
            focused: None,
            reloads: 0,
            cookies: BTreeMap::new(),
            window: (1280, 800),
        };
        dom.body = dom.append(dom.root, NodeSpec::new("body"));
        dom
    }

    /// The `<html>` node
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` node
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn contains_id(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Append a new node as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::from_spec(spec, Some(parent)));
        self.node_mut(parent).children.push(id);
        id
    }

    /// Detach `node` (and its subtree) from the document
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        if let Some(parent) = self.node(node).parent {
            self.node_mut(parent).children.retain(|c| *c != node);
        }
        self.node_mut(node).parent = None;
        if self.focused.is_some_and(|f| !self.is_attached(f)) {
            self.focused = None;
        }
    }

    /// Whether `node` is reachable from the root
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Replace the node's own text
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.node_mut(node).text = text.to_string();
    }

    /// Set an attribute
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.node_mut(node)
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    /// Remove an attribute
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.node_mut(node).attrs.remove(name);
    }

    /// Show or hide the node
    pub fn set_displayed(&mut self, node: NodeId, displayed: bool) {
        self.node_mut(node).displayed = displayed;
    }

    /// Enable or disable the node
    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        self.node_mut(node).enabled = enabled;
    }

    /// Set the checked state
    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        self.node_mut(node).checked = checked;
    }

    /// Set the editable value
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.node_mut(node).value = value.to_string();
    }

    /// Set the document title
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Resize the browser window
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window = (width, height);
    }

    /// Cookie value by name
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        self.history
            .get(self.position)
            .map_or("about:blank", String::as_str)
    }

    /// Own text plus descendant text, in document order
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = self.node(node).text.clone();
        for child in &self.node(node).children {
            out.push_str(&self.text_content(*child));
        }
        out
    }

    /// Whether the node and all its ancestors are displayed
    #[must_use]
    pub fn is_displayed(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.node(id).displayed {
                return false;
            }
            current = self.node(id).parent;
        }
        true
    }

    /// Attached nodes below `node` in document order, excluding `node`
    #[must_use]
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(node).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Every attached node in document order
    #[must_use]
    pub fn all(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    /// First attached node with the given `id` attribute
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.all()
            .into_iter()
            .find(|n| self.node(*n).attrs.get("id").is_some_and(|v| v == id))
    }

    /// Attached nodes carrying `class`
    #[must_use]
    pub fn by_class(&self, class: &str) -> Vec<NodeId> {
        self.all()
            .into_iter()
            .filter(|n| self.node(*n).has_class(class))
            .collect()
    }

    /// Nearest ancestor with the given tag
    pub(crate) fn ancestor_with_tag(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = self.node(node).parent;
        while let Some(id) = current {
            if self.node(id).tag == tag {
                return Some(id);
            }
            current = self.node(id).parent;
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_shape() {
        let dom = Dom::new();
        assert_eq!(dom.node(dom.root()).tag, "html");
        assert_eq!(dom.node(dom.body()).tag, "body");
        assert_eq!(dom.url(), "about:blank");
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut dom = Dom::new();
        let body = dom.body();
        let list = dom.append(body, NodeSpec::new("ul"));
        let item = dom.append(list, NodeSpec::new("li").text("x"));
        assert!(dom.is_attached(item));
        dom.remove(list);
        assert!(!dom.is_attached(item));
        assert!(dom.by_class("nothing").is_empty());
        assert_eq!(dom.all().len(), 2);
    }

    #[test]
    fn test_classes_and_lookup() {
        let mut dom = Dom::new();
        let body = dom.body();
        let a = dom.append(body, NodeSpec::new("div").id("a").class("x").class("y"));
        assert_eq!(dom.by_id("a"), Some(a));
        assert_eq!(dom.by_class("y"), vec![a]);
        assert_eq!(dom.node(a).attrs.get("class").unwrap(), "x y");
    }

    #[test]
    fn test_hidden_ancestor_hides_descendants() {
        let mut dom = Dom::new();
        let body = dom.body();
        let wrapper = dom.append(body, NodeSpec::new("div").hidden());
        let inner = dom.append(wrapper, NodeSpec::new("span"));
        assert!(!dom.is_displayed(inner));
        dom.set_displayed(wrapper, true);
        assert!(dom.is_displayed(inner));
    }

    #[test]
    fn test_text_content_concatenates() {
        let mut dom = Dom::new();
        let body = dom.body();
        let p = dom.append(body, NodeSpec::new("p").text("Hello "));
        dom.append(p, NodeSpec::new("b").text("World"));
        assert_eq!(dom.text_content(p), "Hello World");
    }
}
