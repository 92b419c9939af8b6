use std::collections::{BTreeMap, BTreeSet, HashMap};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogIndex;
use crate::fold::fold;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    #[default]
    TokenSet,
    Jaccard,
}

impl Similarity {
    pub fn score(self, text: &str, alias: &str) -> f64 {
        match self {
            Self::TokenSet => token_set_ratio(text, alias),
            Self::Jaccard => jaccard_similarity(text, alias),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenSet => "token_set",
            Self::Jaccard => "jaccard",
        }
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    fold(text)
        .split_whitespace()
        .map(|token| token.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Token-set similarity in `[0, 1]`: 1.0 when one side's tokens are a subset
/// of the other's, otherwise the best normalized indel similarity between the
/// shared tokens and each side's full sorted token list.
pub fn token_set_ratio(left: &str, right: &str) -> f64 {
    let left = tokens(left);
    let right = tokens(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = left.intersection(&right).map(String::as_str).collect();
    let only_left: Vec<&str> = left.difference(&right).map(String::as_str).collect();
    let only_right: Vec<&str> = right.difference(&left).map(String::as_str).collect();
    if !common.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 1.0;
    }

    let shared_len = common.join(" ").chars().count();
    let only_left = only_left.join(" ");
    let only_right = only_right.join(" ");
    let left_rest = only_left.chars().count();
    let right_rest = only_right.chars().count();

    // "shared rest" strings differ only in their rests, so comparing the rests
    // gives the distance between the combined strings.
    let separator = usize::from(shared_len != 0);
    let combined_left = shared_len + separator + left_rest;
    let combined_right = shared_len + separator + right_rest;
    let best = indel_similarity(
        indel_distance(&only_left, &only_right),
        combined_left + combined_right,
    );
    if shared_len == 0 {
        return best;
    }

    best.max(indel_similarity(separator + left_rest, shared_len + combined_left))
        .max(indel_similarity(separator + right_rest, shared_len + combined_right))
}

/// Insertions plus deletions needed to turn `left` into `right`.
fn indel_distance(left: &str, right: &str) -> usize {
    let right: Vec<char> = right.chars().collect();
    let mut row = vec![0usize; right.len() + 1];
    let mut left_len = 0;
    for ch in left.chars() {
        left_len += 1;
        let mut diagonal = 0;
        for (index, other) in right.iter().enumerate() {
            let above = row[index + 1];
            row[index + 1] = if ch == *other {
                diagonal + 1
            } else {
                above.max(row[index])
            };
            diagonal = above;
        }
    }
    let common = row[right.len()];
    left_len + right.len() - 2 * common
}

fn indel_similarity(distance: usize, total_len: usize) -> f64 {
    if total_len == 0 {
        return 1.0;
    }
    1.0 - distance as f64 / total_len as f64
}

pub fn jaccard_similarity(left: &str, right: &str) -> f64 {
    let left = tokens(left);
    let right = tokens(right);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Decides whether a text block mentions one of a procedure's acronyms.
pub trait AcronymCoverage: Send + Sync {
    fn covers(&self, text: &str, acronym: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCovered;

impl AcronymCoverage for AlwaysCovered {
    fn covers(&self, _text: &str, _acronym: &str) -> bool {
        true
    }
}

impl<F> AcronymCoverage for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn covers(&self, text: &str, acronym: &str) -> bool {
        self(text, acronym)
    }
}

/// Catalog aliases grouped by entity id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_id: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn from_alias_map(aliases: &HashMap<String, String>) -> Self {
        let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (alias, id) in aliases {
            by_id.entry(id.clone()).or_default().push(alias.clone());
        }
        for aliases in by_id.values_mut() {
            aliases.sort();
        }
        Self { by_id }
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub struct AcronymGate<'a> {
    pub catalog: &'a CatalogIndex,
    pub policy: &'a dyn AcronymCoverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub id: String,
    pub alias: String,
    pub score: f64,
    pub acronym_gated: bool,
}

/// Scores `text` against every alias and returns the best one if it clears
/// `threshold`. Ties keep the first alias seen. When a gate is given and the
/// winning entity has acronyms, the text must cover at least one of them.
pub fn best_fuzzy_match(
    text: &str,
    aliases: &AliasTable,
    similarity: Similarity,
    threshold: f64,
    gate: Option<&AcronymGate<'_>>,
) -> Option<FuzzyMatch> {
    let text = text.trim();
    if text.is_empty() || aliases.is_empty() {
        return None;
    }

    let mut best: Option<(&str, &str, f64)> = None;
    for (id, candidates) in &aliases.by_id {
        for alias in candidates {
            let score = similarity.score(text, alias);
            if score > best.map_or(0.0, |(_, _, top)| top) {
                best = Some((id.as_str(), alias.as_str(), score));
            }
        }
    }

    let (id, alias, score) = best?;
    if score < threshold {
        return None;
    }

    let mut acronym_gated = false;
    if let Some(gate) = gate {
        let acronyms = gate.catalog.acronyms(id);
        if !acronyms.is_empty() {
            acronym_gated = true;
            if !acronyms
                .iter()
                .any(|acronym| gate.policy.covers(text, acronym))
            {
                return None;
            }
        }
    }

    Some(FuzzyMatch {
        id: id.to_string(),
        alias: alias.to_string(),
        score,
        acronym_gated,
    })
}

pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn table(pairs: &[(&str, &str)]) -> AliasTable {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(alias, id)| (alias.to_string(), id.to_string()))
            .collect();
        AliasTable::from_alias_map(&map)
    }

    #[test]
    fn token_set_ratio_treats_subsets_as_full_matches() {
        assert_eq!(token_set_ratio("Wniosek o urlop dziekański, formularz", "wniosek o urlop dziekanski"), 1.0);
        assert_eq!(token_set_ratio("", "wniosek"), 0.0);
        let partial = token_set_ratio("wniosek o stypendium", "wniosek o urlop");
        assert!(partial > 0.0 && partial < 1.0, "partial overlap scored {partial}");
    }

    #[test]
    fn token_set_ratio_scores_insertions_as_indel_edits() {
        let near_miss = token_set_ratio("wniosek o urlop", "wniosek o urlopami");
        assert!((near_miss - 30.0 / 33.0).abs() < 1e-9, "near miss scored {near_miss}");
        assert_eq!(round_score(near_miss), 0.909);

        assert_eq!(indel_distance("urlop", "urlopami"), 3);
        assert_eq!(indel_distance("kot", "pies"), 7);
        assert_eq!(token_set_ratio("kot", "pies"), 0.0);
    }

    #[test]
    fn jaccard_similarity_counts_shared_tokens() {
        assert_eq!(jaccard_similarity("a b c d", "a b"), 0.5);
        assert_eq!(jaccard_similarity("Łódź", "lodz"), 1.0);
        assert_eq!(jaccard_similarity("", ""), 0.0);
    }

    #[test]
    fn best_match_respects_threshold_and_tie_order() {
        let aliases = table(&[("urlop dziekanski", "p2"), ("urlop dziekański", "p1")]);
        let found = best_fuzzy_match("urlop dziekanski", &aliases, Similarity::Jaccard, 0.85, None)
            .expect("alias matches");
        assert_eq!(found.id, "p1");
        assert_eq!(found.score, 1.0);
        assert!(!found.acronym_gated);

        assert!(best_fuzzy_match("urlop zdrowotny", &aliases, Similarity::Jaccard, 0.85, None).is_none());
        assert!(best_fuzzy_match("   ", &aliases, Similarity::Jaccard, 0.0, None).is_none());
    }

    #[test]
    fn failing_acronym_policy_rejects_gated_candidates() {
        let aliases = table(&[("indywidualna organizacja studiow", "p1")]);
        let catalog = CatalogIndex::default().with_acronyms("p1", &["IOS"]);
        let calls = AtomicUsize::new(0);
        let policy = |_: &str, _: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        };
        let gate = AcronymGate {
            catalog: &catalog,
            policy: &policy,
        };

        let found = best_fuzzy_match(
            "Indywidualna organizacja studiów",
            &aliases,
            Similarity::TokenSet,
            0.85,
            Some(&gate),
        );
        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let permissive = AcronymGate {
            catalog: &catalog,
            policy: &AlwaysCovered,
        };
        let found = best_fuzzy_match(
            "Indywidualna organizacja studiów",
            &aliases,
            Similarity::TokenSet,
            0.85,
            Some(&permissive),
        )
        .expect("permissive policy accepts");
        assert!(found.acronym_gated);
    }

    #[test]
    fn round_score_keeps_three_decimals() {
        assert_eq!(round_score(0.87654), 0.877);
        assert_eq!(round_score(0.9), 0.9);
    }
}
