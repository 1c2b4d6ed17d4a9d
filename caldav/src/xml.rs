// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Minimal XML reader and writer for WebDAV/CalDAV bodies.
//!
//! The reader covers the subset servers send in `multistatus` documents:
//! elements, attributes, text, CDATA sections, comments, processing
//! instructions and a `DOCTYPE` without an internal subset. Parsed nodes live
//! in an arena owned by [`Document`]; [`Node`] is a cheap borrowed handle that
//! knows its parent and children.

use std::borrow::Cow;
use std::fmt::Write as _;

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// Calendar server extensions (`getctag`).
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal extensions (`calendar-color`).
    pub const APPLE_ICAL: &str = "http://apple.com/ns/ical/";
}

/// Error raised for malformed XML input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A construct was opened but the input ended before it was closed.
    #[error("unterminated {what} starting at byte {pos}")]
    Unterminated {
        /// What was left open (tag, attribute value, comment, ...).
        what: &'static str,
        /// Byte offset where the construct started.
        pos: usize,
    },

    /// A start tag with no name.
    #[error("empty tag name at byte {pos}")]
    EmptyTagName {
        /// Byte offset of the offending `<`.
        pos: usize,
    },

    /// An attribute that is not of the form `key="value"`.
    #[error("malformed attribute at byte {pos}")]
    MalformedAttribute {
        /// Byte offset of the attribute.
        pos: usize,
    },

    /// A closing tag that does not match the open element.
    #[error("closing tag </{found}> does not match <{expected}> at byte {pos}")]
    MismatchedTag {
        /// Name of the element that is open.
        expected: String,
        /// Name found in the closing tag.
        found: String,
        /// Byte offset of the closing tag.
        pos: usize,
    },

    /// A closing tag with no open element.
    #[error("unexpected closing tag </{found}> at byte {pos}")]
    UnexpectedClose {
        /// Name found in the closing tag.
        found: String,
        /// Byte offset of the closing tag.
        pos: usize,
    },

    /// The input ended while elements were still open.
    #[error("element <{tag}> is never closed")]
    UnclosedElement {
        /// Name of the innermost open element.
        tag: String,
    },
}

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: Option<String>,
    text: Option<String>,
    attrs: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed XML document.
///
/// The root node has no tag and stands for the document itself; the
/// top-level element is its child.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

const ROOT: NodeId = NodeId(0);

impl Document {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData::default()],
        }
    }

    /// Returns the untagged document node.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        Node { doc: self, id: ROOT }
    }

    /// Returns the node with the given id, if it belongs to this document.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.nodes.len()).then_some(Node { doc: self, id })
    }

    /// Serializes the tree back to XML text.
    ///
    /// Text and attribute values are escaped, elements without text or
    /// children are written self-closing. Re-parsing the output yields a tree
    /// of the same shape.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for child in self.root().children() {
            write_node(&mut out, child);
        }
        out
    }

    // Ids are only ever handed out by this document.
    #[allow(clippy::indexing_slicing)]
    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    #[allow(clippy::indexing_slicing)]
    fn push_child(&mut self, parent: NodeId, tag: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: Some(tag),
            parent: Some(parent),
            ..NodeData::default()
        });
        self.nodes[parent.0].children.push(id);
        id
    }
}

/// Borrowed handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    /// Id of this node within its document.
    #[must_use]
    pub const fn id(self) -> NodeId {
        self.id
    }

    /// Full tag name including any namespace prefix, `None` for the root.
    #[must_use]
    pub fn tag(self) -> Option<&'a str> {
        self.doc.data(self.id).tag.as_deref()
    }

    /// Tag name with the namespace prefix stripped.
    #[must_use]
    pub fn local_name(self) -> Option<&'a str> {
        self.tag().map(local_name)
    }

    /// Trimmed inner text, `None` when the element has no text.
    #[must_use]
    pub fn text(self) -> Option<&'a str> {
        self.doc.data(self.id).text.as_deref()
    }

    /// Attributes in document order.
    pub fn attrs(self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.doc
            .data(self.id)
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of the first attribute named `key`.
    #[must_use]
    pub fn attr(self, key: &str) -> Option<&'a str> {
        self.attrs().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Parent node, `None` for the root.
    #[must_use]
    pub fn parent(self) -> Option<Node<'a>> {
        self.doc
            .data(self.id)
            .parent
            .map(|id| Node { doc: self.doc, id })
    }

    /// Child elements in document order.
    pub fn children(self) -> impl Iterator<Item = Node<'a>> {
        let doc = self.doc;
        doc.data(self.id)
            .children
            .iter()
            .map(move |&id| Node { doc, id })
    }

    /// All nodes below this one, depth first in document order.
    pub fn descendants(self) -> impl Iterator<Item = Node<'a>> {
        let doc = self.doc;
        let mut stack: Vec<NodeId> = doc.data(self.id).children.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(doc.data(id).children.iter().rev().copied());
            Some(Node { doc, id })
        })
    }

    /// Whether this node's tag matches `name`.
    ///
    /// In exact mode the full tag or its local name must equal `name`;
    /// otherwise `name` only has to be a substring of the tag.
    #[must_use]
    pub fn matches(self, name: &str, exact: bool) -> bool {
        match self.tag() {
            None => false,
            Some(tag) if exact => tag == name || local_name(tag) == name,
            Some(tag) => tag.contains(name),
        }
    }

    /// Looks up a tag below this node.
    ///
    /// A plain name searches all descendants depth first. A name containing
    /// `/` is a path: each segment must match a direct child of the node
    /// matched by the previous segment.
    #[must_use]
    pub fn find_tag(self, name_or_path: &str, exact: bool) -> Option<Node<'a>> {
        if name_or_path.contains('/') {
            name_or_path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .try_fold(self, |node, segment| {
                    node.children().find(|c| c.matches(segment, exact))
                })
        } else {
            self.descendants().find(|n| n.matches(name_or_path, exact))
        }
    }

    /// Direct children matching `name` in exact mode.
    pub fn children_named(self, name: &'a str) -> impl Iterator<Item = Node<'a>> {
        self.children().filter(move |c| c.matches(name, true))
    }

    /// Text of the first direct child matching `name` in exact mode.
    #[must_use]
    pub fn child_text(self, name: &str) -> Option<&'a str> {
        self.children()
            .find(|c| c.matches(name, true))
            .and_then(Node::text)
    }
}

/// Strips the namespace prefix of a qualified name.
#[must_use]
pub fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}

/// Parses XML text into a [`Document`].
///
/// # Errors
///
/// Returns a [`ParseError`] for unterminated tags, comments or attribute
/// values, mismatched closing tags and elements left open at the end of
/// input.
pub fn parse(xml: &str) -> Result<Document, ParseError> {
    Parser::new(xml).run()
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    doc: Document,
    current: NodeId,
    text: Vec<String>,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            doc: Document::new(),
            current: ROOT,
            text: vec![String::new()],
        }
    }

    fn run(mut self) -> Result<Document, ParseError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            let Some(offset) = rest.find('<') else {
                self.push_text(rest);
                break;
            };
            let raw = rest.get(..offset).unwrap_or_default();
            self.push_text(raw);
            self.pos += offset;

            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.cdata()?;
            } else if rest.starts_with("<!") {
                self.skip_past(">", "declaration")?;
            } else if rest.starts_with("</") {
                self.end_tag()?;
            } else {
                self.start_tag()?;
            }
        }

        if self.current != ROOT {
            let tag = self
                .doc
                .data(self.current)
                .tag
                .clone()
                .unwrap_or_default();
            return Err(ParseError::UnclosedElement { tag });
        }
        Ok(self.doc)
    }

    fn rest(&self) -> &'s str {
        self.src.get(self.pos..).unwrap_or_default()
    }

    fn skip_past(&mut self, terminator: &str, what: &'static str) -> Result<(), ParseError> {
        let start = self.pos;
        let end = self
            .rest()
            .find(terminator)
            .ok_or(ParseError::Unterminated { what, pos: start })?;
        self.pos += end + terminator.len();
        Ok(())
    }

    fn cdata(&mut self) -> Result<(), ParseError> {
        const OPEN: &str = "<![CDATA[";
        let start = self.pos;
        let body = self.rest().get(OPEN.len()..).unwrap_or_default();
        let end = body.find("]]>").ok_or(ParseError::Unterminated {
            what: "CDATA section",
            pos: start,
        })?;
        if let Some(buf) = self.text.last_mut() {
            buf.push_str(body.get(..end).unwrap_or_default());
        }
        self.pos += OPEN.len() + end + 3;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest.find('>').ok_or(ParseError::Unterminated {
            what: "closing tag",
            pos: start,
        })?;
        let found = rest.get(2..end).unwrap_or_default().trim().to_string();
        self.pos += end + 1;

        let Some(expected) = self.doc.data(self.current).tag.clone() else {
            return Err(ParseError::UnexpectedClose { found, pos: start });
        };
        if expected != found {
            return Err(ParseError::MismatchedTag {
                expected,
                found,
                pos: start,
            });
        }
        self.close_current();
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let unterminated = ParseError::Unterminated {
            what: "tag",
            pos: start,
        };

        self.pos += 1;
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .ok_or_else(|| unterminated.clone())?;
        if name_len == 0 {
            return Err(ParseError::EmptyTagName { pos: start });
        }
        let name = rest.get(..name_len).unwrap_or_default().to_string();
        self.pos += name_len;

        let id = self.doc.push_child(self.current, name);
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(unterminated);
            } else if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(());
            } else if rest.starts_with('>') {
                self.pos += 1;
                self.current = id;
                self.text.push(String::new());
                return Ok(());
            }
            let attr = self.attribute()?;
            if let Some(node) = self.doc.nodes.get_mut(id.0) {
                node.attrs.push(attr);
            }
        }
    }

    fn attribute(&mut self) -> Result<(String, String), ParseError> {
        let start = self.pos;
        let malformed = ParseError::MalformedAttribute { pos: start };

        let rest = self.rest();
        let key_len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '=' | '/' | '>'))
            .unwrap_or(rest.len());
        if key_len == 0 {
            return Err(malformed);
        }
        let key = rest.get(..key_len).unwrap_or_default().to_string();
        self.pos += key_len;

        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Err(malformed);
        }
        self.pos += 1;
        self.skip_whitespace();

        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            Some(_) => return Err(malformed),
            None => {
                return Err(ParseError::Unterminated {
                    what: "tag",
                    pos: start,
                });
            }
        };
        let body = rest.get(1..).unwrap_or_default();
        let end = body.find(quote).ok_or(ParseError::Unterminated {
            what: "attribute value",
            pos: start,
        })?;
        let value = decode_entities(body.get(..end).unwrap_or_default()).into_owned();
        self.pos += end + 2;
        Ok((key, value))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn push_text(&mut self, raw: &str) {
        if self.current == ROOT || raw.is_empty() {
            return;
        }
        if let Some(buf) = self.text.last_mut() {
            buf.push_str(&decode_entities(raw));
        }
    }

    fn close_current(&mut self) {
        let text = self.text.pop().unwrap_or_default();
        let trimmed = text.trim();
        let Some(node) = self.doc.nodes.get_mut(self.current.0) else {
            self.current = ROOT;
            return;
        };
        node.text = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.current = node.parent.unwrap_or(ROOT);
    }
}

/// Decodes the predefined entities and numeric character references.
///
/// Unknown or unterminated references are kept literally.
#[must_use]
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(rest.get(..amp).unwrap_or_default());
        let tail = rest.get(amp..).unwrap_or_default();
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 12)
            .and_then(|semi| Some((decode_entity(tail.get(1..semi)?)?, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = tail.get(semi + 1..).unwrap_or_default();
            }
            None => {
                out.push('&');
                rest = tail.get(1..).unwrap_or_default();
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Escapes text content.
#[must_use]
pub fn escape_text(raw: &str) -> Cow<'_, str> {
    escape(raw, false)
}

/// Escapes an attribute value for use inside double quotes.
#[must_use]
pub fn escape_attr(raw: &str) -> Cow<'_, str> {
    escape(raw, true)
}

fn escape(raw: &str, quotes: bool) -> Cow<'_, str> {
    let needs = |c: char| matches!(c, '&' | '<' | '>') || (quotes && matches!(c, '"' | '\''));
    if !raw.contains(needs) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            '\'' if quotes => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn write_open<'k>(
    out: &mut String,
    tag: &str,
    attrs: impl Iterator<Item = (&'k str, &'k str)>,
) {
    out.push('<');
    out.push_str(tag);
    for (key, value) in attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
    }
}

fn write_node(out: &mut String, node: Node<'_>) {
    let tag = node.tag().unwrap_or_default();
    write_open(out, tag, node.attrs());
    let mut children = node.children().peekable();
    if node.text().is_none() && children.peek().is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(text) = node.text() {
        out.push_str(&escape_text(text));
    }
    for child in children {
        write_node(out, child);
    }
    let _ = write!(out, "</{tag}>");
}

/// Owned element used to build request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Appends a child element in place.
    pub fn push(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Serializes the element as a complete document with an XML declaration.
    #[must_use]
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        write_open(
            out,
            &self.name,
            self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_text(text));
        }
        for child in &self.children {
            child.write(out);
        }
        let _ = write!(out, "</{}>", self.name);
    }
}
