use std::ops::Range;

use tracing::debug;

use super::alias_regex::AliasRegex;
use crate::dom::{ANNOTATION_ATTR, Document, NodeId};
use crate::fold::fold_with_map;
use crate::model::AnchorKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMatch {
    pub key: String,
    pub original: Range<usize>,
    pub raw: String,
}

/// Matches aliases against the folded copy of `text` and maps every hit back
/// to its byte range in `text`.
pub fn find_alias_matches(text: &str, aliases: &AliasRegex) -> Vec<AliasMatch> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let folded = fold_with_map(text);
    aliases
        .find_ranges(&folded.text)
        .into_iter()
        .filter_map(|range| {
            let original = folded.original_range(range.clone())?;
            let raw = text.get(original.clone())?.to_string();
            Some(AliasMatch {
                key: folded.text[range].trim().to_string(),
                original,
                raw,
            })
        })
        .collect()
}

/// Splits `node` once per range, last range first, so the offsets of the
/// ranges still to be applied stay valid. Returns the wrapper created for
/// each range, in the order of `ranges`.
pub fn split_at_ranges(
    doc: &mut Document,
    node: NodeId,
    ranges: &[Range<usize>],
    kind: AnchorKind,
) -> Vec<Option<NodeId>> {
    let mut wrappers = vec![None; ranges.len()];
    let mut current = node;

    for (index, range) in ranges.iter().enumerate().rev() {
        match doc.split_text(current, range.clone(), kind.as_str()) {
            Some(split) => {
                wrappers[index] = Some(split.wrapper);
                match split.before {
                    Some(before) => current = before,
                    None => break,
                }
            }
            None => debug!(
                node = node.index(),
                start = range.start,
                end = range.end,
                kind = %kind,
                "skipped match that could not be split"
            ),
        }
    }

    wrappers
}

pub fn is_annotated(doc: &Document, node: NodeId) -> bool {
    doc.ancestors(node)
        .any(|ancestor| doc.attr(ancestor, ANNOTATION_ATTR).is_some())
}

pub fn annotatable_text_nodes(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    doc.text_nodes(scope)
        .into_iter()
        .filter(|&node| !is_annotated(doc, node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::alias_regex::build_alias_regex;
    use super::*;
    use crate::fold::fold;

    #[test]
    fn find_alias_matches_maps_folded_hits_to_original_text() {
        let aliases = build_alias_regex(["jan kowalski", "zaneta cwik"]).expect("regex compiles");
        let text = "Kierownik: Jan   Kowalski oraz ŻANETA Ćwik.";
        let matches = find_alias_matches(text, &aliases);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].raw, "Jan   Kowalski");
        assert_eq!(matches[0].key, "jan kowalski");
        assert_eq!(matches[1].raw, "ŻANETA Ćwik");
        for found in &matches {
            assert_eq!(fold(&text[found.original.clone()]), found.key);
        }
    }

    #[test]
    fn find_alias_matches_returns_nothing_for_blank_text() {
        let aliases = build_alias_regex(["jan"]).expect("regex compiles");
        assert!(find_alias_matches("   ", &aliases).is_empty());
        assert!(find_alias_matches("Janina", &aliases).is_empty());
    }

    #[test]
    fn split_at_ranges_creates_one_wrapper_per_match_in_order() {
        let mut doc = Document::parse_html("<body><p>Ala, Ola i Ela</p></body>");
        let p = doc
            .elements(doc.root())
            .into_iter()
            .find(|&node| doc.is_element(node, "p"))
            .expect("paragraph present");
        let text = doc.children(p)[0];

        let wrappers = split_at_ranges(&mut doc, text, &[0..3, 5..8, 11..14], AnchorKind::PersonName);
        let wrappers: Vec<NodeId> = wrappers.into_iter().map(|w| w.expect("split")).collect();

        let contents: Vec<String> = wrappers
            .iter()
            .map(|&wrapper| doc.text_content(wrapper, ""))
            .collect();
        assert_eq!(contents, vec!["Ala", "Ola", "Ela"]);
        assert_eq!(doc.children(p).len(), 5);
        assert_eq!(doc.text_content(p, "|"), "Ala|,|Ola|i|Ela");
        assert!(wrappers.iter().all(|&wrapper| doc.is_attached(wrapper)));
    }

    #[test]
    fn annotatable_text_nodes_skips_existing_wrappers() {
        let mut doc = Document::parse_html("<body><p>one two</p></body>");
        let text = doc.text_nodes(doc.root())[0];
        split_at_ranges(&mut doc, text, &[4..7], AnchorKind::Unit);

        let remaining: Vec<&str> = annotatable_text_nodes(&doc, doc.root())
            .into_iter()
            .filter_map(|node| doc.text(node))
            .collect();
        assert_eq!(remaining, vec!["one "]);
    }
}
