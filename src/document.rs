use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Node as HtmlNode};

/// Elements whose text never belongs to a listing.
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Elements nested deeper than this are dropped with their subtrees.
/// Real listing pages stay far below it.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Text(String),
    Element(Node),
}

/// Immutable element node: tag, attributes, and text/element children in
/// document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    content: Vec<Content>,
}

/// A typed predicate over a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Tag(String),
    AttrPresent(String),
    AttrContains { attr: String, needle: String },
    AttrContainsAny { attr: String, needles: Vec<String> },
    All(Vec<Selector>),
    Any(Vec<Selector>),
}

impl Selector {
    pub fn tag(tag: &str) -> Selector {
        Selector::Tag(tag.to_lowercase())
    }

    pub fn tags(tags: &[&str]) -> Selector {
        Selector::Any(tags.iter().map(|t| Selector::tag(t)).collect())
    }

    pub fn has_attr(attr: &str) -> Selector {
        Selector::AttrPresent(attr.to_string())
    }

    pub fn attr_contains(attr: &str, needle: &str) -> Selector {
        Selector::AttrContains {
            attr: attr.to_string(),
            needle: needle.to_string(),
        }
    }

    pub fn class_contains_any(needles: &[&str]) -> Selector {
        Selector::AttrContainsAny {
            attr: "class".to_string(),
            needles: needles.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn and(self, other: Selector) -> Selector {
        match self {
            Selector::All(mut parts) => {
                parts.push(other);
                Selector::All(parts)
            }
            first => Selector::All(vec![first, other]),
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Selector::Tag(tag) => node.tag == *tag,
            Selector::AttrPresent(attr) => node.attributes.contains_key(attr),
            Selector::AttrContains { attr, needle } => node
                .attr(attr)
                .map_or(false, |value| value.contains(needle.as_str())),
            Selector::AttrContainsAny { attr, needles } => node
                .attr(attr)
                .map_or(false, |value| needles.iter().any(|n| value.contains(n.as_str()))),
            Selector::All(parts) => parts.iter().all(|s| s.matches(node)),
            Selector::Any(parts) => parts.iter().any(|s| s.matches(node)),
        }
    }
}

impl Node {
    pub fn element(tag: &str) -> Node {
        Node {
            tag: tag.to_lowercase(),
            attributes: BTreeMap::new(),
            content: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Node {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Node {
        self.content.push(Content::Text(text.to_string()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Node {
        self.content.push(Content::Element(child));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.content.iter().filter_map(|c| match c {
            Content::Element(node) => Some(node),
            Content::Text(_) => None,
        })
    }

    /// Every element below this one, depth-first in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children().rev().collect(),
        }
    }

    pub fn find(&self, selector: &Selector) -> Option<&Node> {
        self.descendants().find(|node| selector.matches(node))
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<&Node> {
        self.descendants().filter(|node| selector.matches(node)).collect()
    }

    /// Ordered fallback: the first selector with any match decides the result.
    pub fn select_first(&self, selectors: &[Selector]) -> Option<&Node> {
        selectors.iter().find_map(|selector| self.find(selector))
    }

    /// Trimmed, non-empty text chunks of this subtree in document order.
    pub fn text_chunks(&self) -> Vec<&str> {
        let mut chunks = Vec::new();
        let mut stack = vec![self.content.iter()];
        while let Some(level) = stack.last_mut() {
            match level.next() {
                Some(Content::Text(text)) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        chunks.push(trimmed);
                    }
                }
                Some(Content::Element(child)) => stack.push(child.content.iter()),
                None => {
                    stack.pop();
                }
            }
        }
        chunks
    }

    /// Flattened text, one chunk per line.
    pub fn text(&self) -> String {
        self.text_chunks().join("\n")
    }

    /// Flattened text on a single line, for pattern scanning.
    pub fn inline_text(&self) -> String {
        self.text_chunks().join(" ")
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().rev());
        Some(node)
    }
}

/// A parsed page. Read-only for the lifetime of an extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    pub fn parse_html(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        Document {
            root: convert_element(parsed.root_element(), 0),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn find(&self, selector: &Selector) -> Option<&Node> {
        if selector.matches(&self.root) {
            return Some(&self.root);
        }
        self.root.find(selector)
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<&Node> {
        let mut found = Vec::new();
        if selector.matches(&self.root) {
            found.push(&self.root);
        }
        found.extend(self.root.find_all(selector));
        found
    }

    pub fn select_first(&self, selectors: &[Selector]) -> Option<&Node> {
        selectors.iter().find_map(|selector| self.find(selector))
    }
}

fn convert_element(element: ElementRef<'_>, depth: usize) -> Node {
    let value = element.value();
    let mut node = Node::element(value.name());
    for (name, attr_value) in value.attrs() {
        node.attributes.insert(name.to_string(), attr_value.to_string());
    }

    for child in element.children() {
        match child.value() {
            HtmlNode::Text(text) => {
                let chunk: &str = text;
                node.content.push(Content::Text(chunk.to_string()));
            }
            HtmlNode::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            HtmlNode::Element(_) if depth + 1 >= MAX_DEPTH => {}
            HtmlNode::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    node.content.push(Content::Element(convert_element(child_element, depth + 1)));
                }
            }
            _ => {}
        }
    }
    node
}
