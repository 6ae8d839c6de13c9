//! Owned HTML node tree.
//!
//! Fetched documents are parsed with [`scraper`] (html5ever underneath) and
//! converted into the small owned tree defined here, because assembling a
//! [`Route`](crate::route::Route) needs to *edit* the document: the settings
//! element is removed, anchor classes are rewritten, and region contents are
//! serialized back to markup. The same tree backs the in-memory document
//! in [`memory`](crate::memory).
//!
//! Serialization goes through html5ever's HTML serializer, the same one
//! scraper uses, via the [`Serialize`] impls below. Its output is stable
//! under parse → serialize → parse → serialize, which is what byte-for-byte
//! region comparison relies on.

use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::{LocalName, Namespace, QualName};
use scraper::Html;
use std::io;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A node in the owned tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
}

/// An element with its attributes (in source order) and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether an attribute is present.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    /// Set an attribute, keeping its original position if it exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    /// Remove an attribute.
    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    /// Iterate the whitespace-separated class list.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    /// Check for a class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Add a class once.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    /// Remove every occurrence of a class; drops the attribute when it empties.
    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let remaining: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attr("class");
        } else {
            let joined = remaining.join(" ");
            self.set_attr("class", joined);
        }
    }

    /// Serialize the children.
    pub fn inner_html(&self) -> String {
        let parent = (!self.is_root()).then(|| self.qual_name());
        to_html(self, TraversalScope::ChildrenOnly(parent))
    }

    /// Serialize the element itself.
    pub fn outer_html(&self) -> String {
        to_html(self, TraversalScope::IncludeNode)
    }

    /// Synthetic roots (`#document`, `#fragment`) serialize as their children.
    fn is_root(&self) -> bool {
        self.name.starts_with('#')
    }

    fn qual_name(&self) -> QualName {
        QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(self.name.as_str()),
        )
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Replace the children with parsed markup.
    pub fn set_inner_html(&mut self, markup: &str) {
        self.children = parse_fragment(markup);
    }

    /// First descendant (not including `self`) matching `pred`, depth first.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        find_in(&self.children, pred)
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        find_in_mut(&mut self.children, pred)
    }

    /// Every descendant matching `pred`, in document order. Matches are not
    /// searched for nested matches.
    pub fn find_all(&self, pred: &dyn Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        find_all_in(&self.children, pred, &mut out);
        out
    }

    /// Visit every descendant element, parents before children.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Element)) {
        walk_nodes_mut(&mut self.children, visit);
    }

    /// Detach and return the first descendant matching `pred`.
    pub fn remove_first(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<Element> {
        remove_first_in(&mut self.children, pred)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a full document. The returned element is a synthetic `#document`
/// root holding the doctype (if any) and the `<html>` element.
pub fn parse_document(markup: &str) -> Element {
    let html = Html::parse_document(markup);
    let mut root = Element::new("#document");
    root.children = convert_children(html.tree.root());
    root
}

/// Parse markup in body context and return the resulting nodes.
pub fn parse_fragment(markup: &str) -> Vec<Node> {
    let html = Html::parse_fragment(markup);
    let mut nodes = convert_children(html.tree.root());
    // html5ever wraps fragments in a synthetic <html> context element.
    if let [Node::Element(wrapper)] = nodes.as_mut_slice() {
        if wrapper.name == "html" && wrapper.attrs.is_empty() {
            return std::mem::take(&mut wrapper.children);
        }
    }
    nodes
}

fn convert_children(node: ego_tree::NodeRef<'_, scraper::Node>) -> Vec<Node> {
    node.children().filter_map(convert_node).collect()
}

fn convert_node(node: ego_tree::NodeRef<'_, scraper::Node>) -> Option<Node> {
    match node.value() {
        scraper::Node::Element(el) => Some(Node::Element(Element {
            name: el.name().to_string(),
            attrs: el
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children: convert_children(node),
        })),
        scraper::Node::Text(text) => Some(Node::Text(text.text.to_string())),
        scraper::Node::Comment(comment) => Some(Node::Comment(comment.comment.to_string())),
        scraper::Node::Doctype(doctype) => Some(Node::Doctype(doctype.name().to_string())),
        scraper::Node::Document | scraper::Node::Fragment => {
            // Nested roots do not occur below the tree root; flatten them.
            let mut wrapper = Element::new("#fragment");
            wrapper.children = convert_children(node);
            Some(Node::Element(wrapper))
        }
        scraper::Node::ProcessingInstruction(_) => None,
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Serialize a node list.
pub fn serialize_nodes(nodes: &[Node]) -> String {
    to_html(&NodeList(nodes), TraversalScope::ChildrenOnly(None))
}

fn to_html<T: Serialize>(node: &T, traversal_scope: TraversalScope) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..SerializeOpts::default()
    };
    if serialize(&mut buf, node, opts).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

struct NodeList<'a>(&'a [Node]);

impl Serialize for NodeList<'_> {
    fn serialize<S>(&self, serializer: &mut S, _: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        for node in self.0 {
            node.serialize(serializer, TraversalScope::IncludeNode)?;
        }
        Ok(())
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match self {
            Node::Element(el) => el.serialize(serializer, traversal_scope),
            Node::Text(text) => serializer.write_text(text),
            Node::Comment(comment) => serializer.write_comment(comment),
            Node::Doctype(name) => serializer.write_doctype(name),
        }
    }
}

impl Serialize for Element {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let include_node = matches!(traversal_scope, TraversalScope::IncludeNode) && !self.is_root();
        let name = self.qual_name();

        if include_node {
            let attr_names: Vec<QualName> = self
                .attrs
                .iter()
                .map(|(key, _)| {
                    QualName::new(None, Namespace::from(""), LocalName::from(key.as_str()))
                })
                .collect();
            let attrs = attr_names
                .iter()
                .zip(self.attrs.iter().map(|(_, value)| value.as_str()));
            serializer.start_elem(name.clone(), attrs)?;
        }

        for child in &self.children {
            child.serialize(serializer, TraversalScope::IncludeNode)?;
        }

        if include_node {
            serializer.end_elem(name)?;
        }
        Ok(())
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
}

// ============================================================================
// Tree helpers
// ============================================================================

fn find_in<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(el) if pred(el) => Some(el),
        Node::Element(el) => find_in(&el.children, pred),
        _ => None,
    })
}

fn find_in_mut<'a>(
    nodes: &'a mut [Node],
    pred: &dyn Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in_mut(&mut el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn find_all_in<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                out.push(el);
            } else {
                find_all_in(&el.children, pred, out);
            }
        }
    }
}

fn walk_nodes_mut(nodes: &mut [Node], visit: &mut dyn FnMut(&mut Element)) {
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            visit(el);
            walk_nodes_mut(&mut el.children, visit);
        }
    }
}

fn remove_first_in(nodes: &mut Vec<Node>, pred: &dyn Fn(&Element) -> bool) -> Option<Element> {
    let position = nodes
        .iter()
        .position(|node| matches!(node, Node::Element(el) if pred(el)));
    if let Some(index) = position {
        if let Node::Element(el) = nodes.remove(index) {
            return Some(el);
        }
    }
    nodes.iter_mut().find_map(|node| match node {
        Node::Element(el) => remove_first_in(&mut el.children, pred),
        _ => None,
    })
}
