use regex::Regex;

use crate::dom::{Document, NodeId};
use crate::model::{Anchor, AnchorKind};

/// One detection strategy for people anchors. Link detection only reads the
/// document; text detection wraps every match it reports.
pub trait Detector: Send + Sync {
    fn kind(&self) -> AnchorKind;

    fn detect_links(&self, _doc: &Document) -> Vec<Anchor> {
        Vec::new()
    }

    fn detect_text(&self, doc: &mut Document) -> Vec<Anchor>;
}

pub fn is_inside_href(doc: &Document, node: NodeId, pattern: &Regex) -> bool {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .filter_map(|candidate| doc.attr(candidate, "href"))
        .any(|href| pattern.is_match(href))
}

pub fn links_with_href(doc: &Document) -> Vec<(NodeId, &str)> {
    doc.elements(doc.root())
        .into_iter()
        .filter(|&node| doc.is_element(node, "a"))
        .filter_map(|node| doc.attr(node, "href").map(|href| (node, href)))
        .collect()
}
