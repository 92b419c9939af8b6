use std::collections::HashMap;
use std::ops::Range;

use scraper::{Html, Node};
use serde::Serialize;

pub const ANNOTATION_ATTR: &str = "data-annot";
pub const LINE_WRAPPER_ATTR: &str = "data-annot-line";

const NON_RENDERED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitText {
    pub before: Option<NodeId>,
    pub wrapper: NodeId,
    pub after: Option<NodeId>,
}

/// Arena-backed HTML tree. Node handles stay valid for the lifetime of the
/// document; detached nodes keep their slot but are no longer reachable from
/// the root.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse_html(source: &str) -> Self {
        let html = Html::parse_document(source);
        let mut doc = Self::new();
        let mut imported = HashMap::new();

        for node in html.tree.root().descendants() {
            let created = match node.value() {
                Node::Document | Node::Fragment => Some(doc.root()),
                Node::Element(element) => Some(
                    doc.create_element(
                        element.name(),
                        element
                            .attrs()
                            .map(|(name, value)| (name.to_string(), value.to_string())),
                    ),
                ),
                Node::Text(text) => Some(doc.create_text(&*text.text)),
                _ => None,
            };

            let Some(created) = created else {
                continue;
            };

            if created != doc.root() {
                let parent = node
                    .parent()
                    .and_then(|parent| imported.get(&parent.id()).copied());
                match parent {
                    Some(parent) => doc.append(parent, created),
                    None => continue,
                }
            }
            imported.insert(node.id(), created);
        }

        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.slots[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Element(element) => Some(element.name.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.data(id) {
            NodeData::Element(element) => element
                .attrs
                .iter()
                .find(|(attr_name, _)| attr_name == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|node| node == self.root())
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn elements(&self, scope: NodeId) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&node| self.tag_name(node).is_some())
            .collect()
    }

    /// Non-blank text nodes under `scope` in document order, skipping the
    /// contents of non-rendered elements such as `script` and `style`.
    pub fn text_nodes(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_blank_text(scope) == Some(false) {
            out.push(scope);
            return out;
        }

        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            match self.data(node) {
                NodeData::Text(text) => {
                    if !text.trim().is_empty() {
                        out.push(node);
                    }
                }
                NodeData::Element(element) => {
                    if NON_RENDERED_TAGS.contains(&element.name.as_str()) {
                        continue;
                    }
                    stack.extend(self.children(node).iter().rev().copied());
                }
                NodeData::Document => {
                    stack.extend(self.children(node).iter().rev().copied());
                }
            }
        }
        out
    }

    /// Stripped text of every rendered text node under `id`, joined by `separator`.
    pub fn text_content(&self, id: NodeId, separator: &str) -> String {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .map(str::trim)
            .collect::<Vec<&str>>()
            .join(separator)
    }

    pub fn create_element<N, A>(&mut self, name: N, attrs: A) -> NodeId
    where
        N: Into<String>,
        A: IntoIterator<Item = (String, String)>,
    {
        self.push_slot(NodeData::Element(ElementData {
            name: name.into(),
            attrs: attrs.into_iter().collect(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_slot(NodeData::Text(text.into()))
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.slots[parent.0].children.push(child);
        self.slots[child.0].parent = Some(parent);
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some((parent, index)) = self.position(id) {
            self.slots[parent.0].children.remove(index);
        }
        self.slots[id.0].parent = None;
    }

    /// Replaces `id` in its parent with `replacements`, in order.
    pub fn replace_with(&mut self, id: NodeId, replacements: &[NodeId]) -> bool {
        if replacements.contains(&id) || self.position(id).is_none() {
            return false;
        }
        for &node in replacements {
            self.detach(node);
        }
        let Some((parent, index)) = self.position(id) else {
            return false;
        };

        self.slots[parent.0]
            .children
            .splice(index..index + 1, replacements.iter().copied());
        for &node in replacements {
            self.slots[node.0].parent = Some(parent);
        }
        self.slots[id.0].parent = None;
        true
    }

    /// Splits a text node into `[before?, <span data-annot=kind>match</span>, after?]`.
    /// `range` is a byte range into the node's text and must fall on character
    /// boundaries.
    pub fn split_text(&mut self, id: NodeId, range: Range<usize>, kind: &str) -> Option<SplitText> {
        let text = self.text(id)?;
        let before = text.get(..range.start)?.to_string();
        let matched = text.get(range.clone())?.to_string();
        let after = text.get(range.end..)?.to_string();
        if matched.is_empty() || self.parent(id).is_none() {
            return None;
        }

        let wrapper = self.create_element("span", [(ANNOTATION_ATTR.to_string(), kind.to_string())]);
        let inner = self.create_text(matched);
        self.append(wrapper, inner);

        let before = (!before.is_empty()).then(|| self.create_text(before));
        let after = (!after.is_empty()).then(|| self.create_text(after));

        let parts: Vec<NodeId> = before
            .into_iter()
            .chain(std::iter::once(wrapper))
            .chain(after)
            .collect();
        if !self.replace_with(id, &parts) {
            return None;
        }

        Some(SplitText {
            before,
            wrapper,
            after,
        })
    }

    /// Moves `parent.children[run]` into a new element inserted where the run began.
    pub fn wrap_run<A>(&mut self, parent: NodeId, run: Range<usize>, name: &str, attrs: A) -> Option<NodeId>
    where
        A: IntoIterator<Item = (String, String)>,
    {
        if run.start >= run.end || run.end > self.children(parent).len() {
            return None;
        }

        let moved: Vec<NodeId> = self.children(parent)[run.clone()].to_vec();
        let wrapper = self.create_element(name, attrs);
        self.slots[parent.0]
            .children
            .splice(run, std::iter::once(wrapper));
        self.slots[wrapper.0].parent = Some(parent);
        for node in moved {
            self.slots[node.0].parent = Some(wrapper);
            self.slots[wrapper.0].children.push(node);
        }
        Some(wrapper)
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if self
            .children(self.root())
            .iter()
            .any(|&child| self.is_element(child, "html"))
        {
            out.push_str("<!DOCTYPE html>");
        }
        for &child in self.children(self.root()) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Document => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Text(text) => {
                let raw_parent = self
                    .parent(id)
                    .and_then(|parent| self.tag_name(parent))
                    .map(|name| RAW_TEXT_TAGS.contains(&name))
                    .unwrap_or(false);
                if raw_parent {
                    out.push_str(text);
                } else {
                    push_escaped(out, text, false);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    push_escaped(out, value, true);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&element.name.as_str()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
        }
    }

    fn push_slot(&mut self, data: NodeData) -> NodeId {
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.slots.len() - 1)
    }

    fn position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&child| child == id)?;
        Some((parent, index))
    }

    fn is_blank_text(&self, id: NodeId) -> Option<bool> {
        self.text(id).map(|text| text.trim().is_empty())
    }
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
