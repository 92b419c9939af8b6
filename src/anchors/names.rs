use std::ops::Range;

use super::alias_regex::AliasRegex;
use super::detector::Detector;
use super::matcher::{annotatable_text_nodes, find_alias_matches, split_at_ranges};
use super::wrap_node::choose_line_wrapper;
use crate::dom::Document;
use crate::model::{Anchor, AnchorKind};

pub struct PersonNameDetector {
    names: AliasRegex,
}

impl PersonNameDetector {
    pub fn new(names: AliasRegex) -> Self {
        Self { names }
    }
}

impl Detector for PersonNameDetector {
    fn kind(&self) -> AnchorKind {
        AnchorKind::PersonName
    }

    fn detect_text(&self, doc: &mut Document) -> Vec<Anchor> {
        if self.names.alias_count() == 0 {
            return Vec::new();
        }

        let mut spans = Vec::new();
        for node in annotatable_text_nodes(doc, doc.root()) {
            let Some(text) = doc.text(node) else {
                continue;
            };
            let matches = find_alias_matches(text, &self.names);
            if matches.is_empty() {
                continue;
            }

            let ranges: Vec<Range<usize>> = matches.iter().map(|found| found.original.clone()).collect();
            let wrappers = split_at_ranges(doc, node, &ranges, AnchorKind::PersonName);
            for (found, wrapper) in matches.into_iter().zip(wrappers) {
                if let Some(span) = wrapper {
                    spans.push((span, found.key));
                }
            }
        }

        // Widening runs after every split so sibling indices stay stable while splitting.
        spans
            .into_iter()
            .map(|(span, key)| {
                let line = choose_line_wrapper(doc, span);
                Anchor::detected(AnchorKind::PersonName, line, span, key, "det:name_regex")
            })
            .collect()
    }
}
