use std::collections::BTreeSet;
use std::ops::Range;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

const ALIAS_REGEX_SIZE_LIMIT: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AliasRegex {
    regex: Option<Regex>,
    alias_count: usize,
}

impl AliasRegex {
    pub fn empty() -> Self {
        Self {
            regex: None,
            alias_count: 0,
        }
    }

    pub fn alias_count(&self) -> usize {
        self.alias_count
    }

    pub fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        match &self.regex {
            Some(regex) => regex.find_iter(text).map(|found| found.range()).collect(),
            None => Vec::new(),
        }
    }
}

/// Compiles folded alias keys into one alternation, longest alias first, with
/// each alternative anchored so it can neither start nor end inside a word.
pub fn build_alias_regex<'a, I>(keys: I) -> Result<AliasRegex>
where
    I: IntoIterator<Item = &'a str>,
{
    let unique: BTreeSet<&str> = keys
        .into_iter()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect();
    if unique.is_empty() {
        return Ok(AliasRegex::empty());
    }

    let mut ordered: Vec<&str> = unique.into_iter().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternation = ordered
        .iter()
        .map(|key| bounded_alternative(key))
        .collect::<Vec<String>>()
        .join("|");

    let regex = RegexBuilder::new(&format!("(?:{alternation})"))
        .size_limit(ALIAS_REGEX_SIZE_LIMIT)
        .build()
        .with_context(|| format!("failed to compile alias regex for {} keys", ordered.len()))?;

    Ok(AliasRegex {
        regex: Some(regex),
        alias_count: ordered.len(),
    })
}

fn bounded_alternative(key: &str) -> String {
    let leading = boundary_for(key.chars().next());
    let trailing = boundary_for(key.chars().next_back());
    format!("{leading}{}{trailing}", regex::escape(key))
}

// `\b` next to a word character and `\B` next to anything else together
// behave like "not preceded/followed by a word character".
fn boundary_for(edge: Option<char>) -> &'static str {
    match edge {
        Some(ch) if is_word_char(ch) => r"\b",
        _ => r"\B",
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
