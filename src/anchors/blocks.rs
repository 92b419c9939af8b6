use std::ops::Range;

use tracing::debug;

use super::alias_regex::AliasRegex;
use super::fuzzy::{
    AcronymCoverage, AcronymGate, AliasTable, FuzzyMatch, Similarity, best_fuzzy_match, round_score,
};
use super::matcher::{annotatable_text_nodes, find_alias_matches, split_at_ranges};
use crate::catalog::CatalogIndex;
use crate::dom::{ANNOTATION_ATTR, Document, NodeId};
use crate::model::{Anchor, AnchorKind};

const BLOCK_TAGS: &[&str] = &[
    "p", "li", "dd", "dt", "td", "th", "div", "article", "section", "header", "footer", "aside",
    "main", "nav", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Compiled unit and procedure matchers for one catalog.
pub struct BlockMatchers {
    pub units: AliasRegex,
    pub procedures: AliasRegex,
    pub unit_aliases: AliasTable,
    pub procedure_aliases: AliasTable,
}

pub struct BlockPass<'a> {
    pub catalog: &'a CatalogIndex,
    pub matchers: &'a BlockMatchers,
    pub similarity: Similarity,
    pub threshold: f64,
    pub acronym_policy: &'a dyn AcronymCoverage,
}

impl BlockPass<'_> {
    /// Visits block elements in document order. Exact label and alias hits
    /// inside a block win; a block without any gets one fuzzy attempt on its
    /// whole text, procedures before units.
    pub fn run(&self, doc: &mut Document) -> Vec<Anchor> {
        let blocks: Vec<NodeId> = doc
            .elements(doc.root())
            .into_iter()
            .filter(|&node| is_block(doc, node))
            .collect();

        let mut anchors = Vec::new();
        for block in blocks {
            if !doc.is_attached(block) || doc.text_content(block, " ").is_empty() {
                continue;
            }

            let already_marked = contains_block_annotation(doc, block);
            let mut exact = self.exact_matches(doc, block, AnchorKind::Unit);
            exact.extend(self.exact_matches(doc, block, AnchorKind::Procedure));
            if already_marked || !exact.is_empty() {
                anchors.extend(exact);
                continue;
            }

            anchors.extend(self.fuzzy_match(doc, block));
        }

        debug!(anchors = anchors.len(), "unit and procedure block pass finished");
        anchors
    }

    fn exact_matches(&self, doc: &mut Document, block: NodeId, kind: AnchorKind) -> Vec<Anchor> {
        let (regex, by_key, source) = match kind {
            AnchorKind::Unit => (&self.matchers.units, &self.catalog.unit_by_label, "det:label"),
            _ => (
                &self.matchers.procedures,
                &self.catalog.procedure_by_alias,
                "det:alias",
            ),
        };
        if regex.alias_count() == 0 {
            return Vec::new();
        }

        let mut anchors = Vec::new();
        for node in annotatable_text_nodes(doc, block) {
            let Some(text) = doc.text(node) else {
                continue;
            };
            let hits: Vec<(Range<usize>, String, String)> = find_alias_matches(text, regex)
                .into_iter()
                .filter_map(|found| {
                    let id = by_key.get(&found.key)?.clone();
                    Some((found.original, found.raw, id))
                })
                .collect();
            if hits.is_empty() {
                continue;
            }

            let ranges: Vec<Range<usize>> = hits.iter().map(|(range, _, _)| range.clone()).collect();
            let wrappers = split_at_ranges(doc, node, &ranges, kind);
            for ((_, raw, id), wrapper) in hits.into_iter().zip(wrappers) {
                if let Some(span) = wrapper {
                    let name = self.catalog.display_name(kind, &id);
                    anchors.push(Anchor::detected(kind, span, span, raw, source).with_id(id.as_str(), name));
                }
            }
        }
        anchors
    }

    fn fuzzy_match(&self, doc: &Document, block: NodeId) -> Option<Anchor> {
        let text = doc.text_content(block, " ");

        let gate = AcronymGate {
            catalog: self.catalog,
            policy: self.acronym_policy,
        };
        if let Some(found) = best_fuzzy_match(
            &text,
            &self.matchers.procedure_aliases,
            self.similarity,
            self.threshold,
            Some(&gate),
        ) {
            let source = if found.acronym_gated {
                "fuzz:alias+acron"
            } else {
                "fuzz:alias"
            };
            return Some(self.fuzzy_anchor(AnchorKind::Procedure, block, found, source));
        }

        let found = best_fuzzy_match(
            &text,
            &self.matchers.unit_aliases,
            self.similarity,
            self.threshold,
            None,
        )?;
        Some(self.fuzzy_anchor(AnchorKind::Unit, block, found, "fuzz:label"))
    }

    fn fuzzy_anchor(&self, kind: AnchorKind, block: NodeId, found: FuzzyMatch, source: &str) -> Anchor {
        let name = self.catalog.display_name(kind, &found.id);
        Anchor::detected(kind, block, block, found.alias, source)
            .with_id(found.id.as_str(), name)
            .with_score(round_score(found.score))
    }
}

fn is_block(doc: &Document, node: NodeId) -> bool {
    doc.tag_name(node)
        .is_some_and(|tag| BLOCK_TAGS.contains(&tag))
}

fn contains_block_annotation(doc: &Document, block: NodeId) -> bool {
    doc.descendants(block).into_iter().any(|node| {
        matches!(
            doc.attr(node, ANNOTATION_ATTR),
            Some(kind) if kind == AnchorKind::Unit.as_str() || kind == AnchorKind::Procedure.as_str()
        )
    })
}
