//! Selector evaluation for the mock document.
//!
//! Supported CSS: tag or `*`, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! descendant and `>` combinators, `,` groups.
//!
//! Supported XPath: `/`, `//`, `./`, `.//`, `..`, name tests and `*`, with
//! predicates `[n]`, `[@a]`, `[@a='v']`, `[text()='v']`,
//! `[contains(text(), 'v')]` and `[contains(@a, 'v')]`.

use super::dom::{Dom, NodeId};
use crate::result::{EsperarError, EsperarResult};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn pattern(source: &str) -> EsperarResult<Regex> {
    Regex::new(source).map_err(|e| EsperarError::Backend {
        message: format!("mock selector grammar: {e}"),
    })
}

fn invalid(selector: &str, message: &str) -> EsperarError {
    EsperarError::InvalidSelector {
        selector: selector.to_string(),
        message: message.to_string(),
    }
}

// =============================================================================
// CSS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let n = dom.node(node);
        if self.tag.as_ref().is_some_and(|t| *t != n.tag) {
            return false;
        }
        if self.id.as_ref().is_some_and(|id| n.attrs.get("id") != Some(id)) {
            return false;
        }
        if !self.classes.iter().all(|c| n.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match value {
            None => n.attrs.contains_key(name),
            Some(v) => n.attrs.get(name) == Some(v),
        })
    }
}

type Complex = Vec<(Combinator, Compound)>;

struct CssGrammar {
    compound: Regex,
    part: Regex,
}

impl CssGrammar {
    fn cached() -> EsperarResult<&'static Self> {
        static CSS: OnceLock<CssGrammar> = OnceLock::new();
        if let Some(grammar) = CSS.get() {
            return Ok(grammar);
        }
        let grammar = Self {
            compound: pattern(r#"^([A-Za-z][\w-]*|\*)?((?:#[\w-]+|\.[\w-]+|\[[\w-]+(?:=(?:"[^"]*"|'[^']*'|[^\]"']*))?\])*)$"#)?,
            part: pattern(r#"#([\w-]+)|\.([\w-]+)|\[([\w-]+)(?:=(?:"([^"]*)"|'([^']*)'|([^\]"']*)))?\]"#)?,
        };
        Ok(CSS.get_or_init(|| grammar))
    }
}

fn parse_css(selector: &str) -> EsperarResult<Vec<Complex>> {
    let grammar = CssGrammar::cached()?;
    let compound_re = &grammar.compound;
    let part_re = &grammar.part;

    let mut groups = Vec::new();
    for group in selector.split(',') {
        let spaced = group.replace('>', " > ");
        let mut complex: Complex = Vec::new();
        let mut combinator = Combinator::Descendant;
        for token in spaced.split_whitespace() {
            if token == ">" {
                if complex.is_empty() {
                    return Err(invalid(selector, "combinator without a left-hand side"));
                }
                combinator = Combinator::Child;
                continue;
            }
            let caps = compound_re
                .captures(token)
                .ok_or_else(|| invalid(selector, "unsupported CSS syntax"))?;
            let mut compound = Compound {
                tag: caps
                    .get(1)
                    .map(|m| m.as_str().to_lowercase())
                    .filter(|t| t != "*"),
                ..Compound::default()
            };
            let rest = caps.get(2).map_or("", |m| m.as_str());
            for part in part_re.captures_iter(rest) {
                if let Some(id) = part.get(1) {
                    compound.id = Some(id.as_str().to_string());
                } else if let Some(class) = part.get(2) {
                    compound.classes.push(class.as_str().to_string());
                } else if let Some(name) = part.get(3) {
                    let value = part
                        .get(4)
                        .or_else(|| part.get(5))
                        .or_else(|| part.get(6))
                        .map(|m| m.as_str().to_string());
                    compound.attrs.push((name.as_str().to_string(), value));
                }
            }
            complex.push((combinator, compound));
            combinator = Combinator::Descendant;
        }
        if complex.is_empty() || combinator == Combinator::Child {
            return Err(invalid(selector, "incomplete CSS selector"));
        }
        groups.push(complex);
    }
    Ok(groups)
}

fn matches_complex(dom: &Dom, parts: &[(Combinator, Compound)], node: NodeId) -> bool {
    let Some(((combinator, last), rest)) = parts.split_last() else {
        return true;
    };
    if !last.matches(dom, node) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => dom
            .node(node)
            .parent
            .is_some_and(|parent| matches_complex(dom, rest, parent)),
        Combinator::Descendant => {
            let mut current = dom.node(node).parent;
            while let Some(ancestor) = current {
                if matches_complex(dom, rest, ancestor) {
                    return true;
                }
                current = dom.node(ancestor).parent;
            }
            false
        }
    }
}

/// Nodes matching a CSS selector under `scope` (or the whole document)
pub(crate) fn select_css(dom: &Dom, scope: Option<NodeId>, selector: &str) -> EsperarResult<Vec<NodeId>> {
    let groups = parse_css(selector)?;
    let candidates = match scope {
        Some(node) => dom.descendants(node),
        None => dom.all(),
    };
    Ok(candidates
        .into_iter()
        .filter(|node| groups.iter().any(|g| matches_complex(dom, g, *node)))
        .collect())
}

// =============================================================================
// XPATH
// =============================================================================

/// A context item: `None` is the document node above `<html>`
type Context = Option<NodeId>;

fn children_of(dom: &Dom, context: Context) -> Vec<NodeId> {
    match context {
        None => vec![dom.root()],
        Some(node) => dom.node(node).children.clone(),
    }
}

fn self_and_descendants(dom: &Dom, context: Context) -> Vec<Context> {
    match context {
        None => std::iter::once(None)
            .chain(dom.all().into_iter().map(Some))
            .collect(),
        Some(node) => std::iter::once(Some(node))
            .chain(dom.descendants(node).into_iter().map(Some))
            .collect(),
    }
}

enum Predicate {
    Position(usize),
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
    TextEquals(String),
    TextContains(String),
}

struct Grammar {
    step: Regex,
    predicate: Regex,
    position: Regex,
    has_attr: Regex,
    attr_equals: Regex,
    attr_contains: Regex,
    text_equals: Regex,
    text_contains: Regex,
}

const LITERAL: &str = r#"(?:'([^']*)'|"([^"]*)")"#;

impl Grammar {
    fn new() -> EsperarResult<Self> {
        Ok(Self {
            step: pattern(r"^(//?)([A-Za-z][\w-]*|\*)((?:\[[^\]]*\])*)")?,
            predicate: pattern(r"\[([^\]]*)\]")?,
            position: pattern(r"^\s*(\d+)\s*$")?,
            has_attr: pattern(r"^\s*@([\w-]+)\s*$")?,
            attr_equals: pattern(&format!(r"^\s*@([\w-]+)\s*=\s*{LITERAL}\s*$"))?,
            attr_contains: pattern(&format!(r"^\s*contains\(\s*@([\w-]+)\s*,\s*{LITERAL}\s*\)\s*$"))?,
            text_equals: pattern(&format!(r"^\s*text\(\)\s*=\s*{LITERAL}\s*$"))?,
            text_contains: pattern(&format!(r"^\s*contains\(\s*text\(\)\s*,\s*{LITERAL}\s*\)\s*$"))?,
        })
    }

    fn cached() -> EsperarResult<&'static Self> {
        static XPATH: OnceLock<Grammar> = OnceLock::new();
        if let Some(grammar) = XPATH.get() {
            return Ok(grammar);
        }
        let grammar = Self::new()?;
        Ok(XPATH.get_or_init(|| grammar))
    }

    fn literal(caps: &regex::Captures<'_>, first: usize) -> String {
        caps.get(first)
            .or_else(|| caps.get(first + 1))
            .map_or_else(String::new, |m| m.as_str().to_string())
    }

    fn parse_predicate(&self, selector: &str, source: &str) -> EsperarResult<Predicate> {
        if let Some(c) = self.position.captures(source) {
            let n: usize = c[1]
                .parse()
                .map_err(|_| invalid(selector, "position out of range"))?;
            if n == 0 {
                return Err(invalid(selector, "positions start at 1"));
            }
            return Ok(Predicate::Position(n));
        }
        if let Some(c) = self.attr_equals.captures(source) {
            return Ok(Predicate::AttrEquals(c[1].to_string(), Self::literal(&c, 2)));
        }
        if let Some(c) = self.has_attr.captures(source) {
            return Ok(Predicate::HasAttr(c[1].to_string()));
        }
        if let Some(c) = self.attr_contains.captures(source) {
            return Ok(Predicate::AttrContains(c[1].to_string(), Self::literal(&c, 2)));
        }
        if let Some(c) = self.text_equals.captures(source) {
            return Ok(Predicate::TextEquals(Self::literal(&c, 1)));
        }
        if let Some(c) = self.text_contains.captures(source) {
            return Ok(Predicate::TextContains(Self::literal(&c, 1)));
        }
        Err(invalid(selector, "unsupported XPath predicate"))
    }
}

fn filter_predicate(dom: &Dom, nodes: Vec<NodeId>, predicate: &Predicate) -> Vec<NodeId> {
    match predicate {
        Predicate::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
        Predicate::HasAttr(name) => nodes
            .into_iter()
            .filter(|id| dom.node(*id).attrs.contains_key(name))
            .collect(),
        Predicate::AttrEquals(name, value) => nodes
            .into_iter()
            .filter(|id| dom.node(*id).attrs.get(name) == Some(value))
            .collect(),
        Predicate::AttrContains(name, value) => nodes
            .into_iter()
            .filter(|id| {
                dom.node(*id)
                    .attrs
                    .get(name)
                    .is_some_and(|v| v.contains(value.as_str()))
            })
            .collect(),
        Predicate::TextEquals(value) => nodes
            .into_iter()
            .filter(|id| dom.node(*id).text.trim() == value.as_str())
            .collect(),
        Predicate::TextContains(value) => nodes
            .into_iter()
            .filter(|id| dom.node(*id).text.contains(value.as_str()))
            .collect(),
    }
}

/// Nodes matching an XPath, relative paths evaluated against `scope`
pub(crate) fn select_xpath(dom: &Dom, scope: Option<NodeId>, selector: &str) -> EsperarResult<Vec<NodeId>> {
    let expr = selector.trim();
    if expr == ".." {
        let parent = scope.and_then(|node| dom.node(node).parent);
        return Ok(parent.into_iter().collect());
    }

    let (mut contexts, mut rest): (Vec<Context>, &str) = if let Some(relative) = expr.strip_prefix('.') {
        if !relative.starts_with('/') {
            return Err(invalid(selector, "unsupported XPath syntax"));
        }
        (vec![scope], relative)
    } else if expr.starts_with('/') {
        (vec![None], expr)
    } else {
        return Err(invalid(selector, "unsupported XPath syntax"));
    };

    let grammar = Grammar::cached()?;
    while !rest.is_empty() {
        let caps = grammar
            .step
            .captures(rest)
            .ok_or_else(|| invalid(selector, "unsupported XPath step"))?;
        let consumed = caps.get(0).map_or(0, |m| m.end());
        let descendant = &caps[1] == "//";
        let name = caps[2].to_lowercase();
        let predicates = grammar
            .predicate
            .captures_iter(caps.get(3).map_or("", |m| m.as_str()))
            .map(|p| grammar.parse_predicate(selector, &p[1]))
            .collect::<EsperarResult<Vec<_>>>()?;

        let bases: Vec<Context> = if descendant {
            contexts
                .iter()
                .flat_map(|c| self_and_descendants(dom, *c))
                .collect()
        } else {
            contexts
        };

        let mut next = BTreeSet::new();
        for base in bases {
            let mut step: Vec<NodeId> = children_of(dom, base)
                .into_iter()
                .filter(|id| name == "*" || dom.node(*id).tag == name)
                .collect();
            for predicate in &predicates {
                step = filter_predicate(dom, step, predicate);
            }
            next.extend(step);
        }

        let order = dom.all();
        contexts = order
            .into_iter()
            .filter(|id| next.contains(id))
            .map(Some)
            .collect();
        rest = &rest[consumed..];
    }

    Ok(contexts.into_iter().flatten().collect())
}
