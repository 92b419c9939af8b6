mod alias_regex;
mod blocks;
mod colors;
mod contact;
mod detector;
mod fuzzy;
mod linker;
mod matcher;
mod names;
mod wrap_node;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::catalog::CatalogIndex;
use crate::dom::Document;
use crate::model::AnchorSet;

use self::alias_regex::build_alias_regex;
use self::blocks::{BlockMatchers, BlockPass};
use self::contact::{EmailDetector, PhoneDetector};
use self::detector::Detector;
use self::fuzzy::AliasTable;
use self::linker::link_anchors;
use self::names::PersonNameDetector;

pub use self::colors::ColorPalette;
pub use self::fuzzy::{AcronymCoverage, AlwaysCovered, Similarity};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

pub struct EngineConfig {
    pub fuzzy_threshold: f64,
    pub similarity: Similarity,
    pub palette: ColorPalette,
    pub acronym_policy: Box<dyn AcronymCoverage>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            similarity: Similarity::default(),
            palette: ColorPalette::default(),
            acronym_policy: Box::new(AlwaysCovered),
        }
    }
}

#[cfg(test)]
impl EngineConfig {
    pub fn with_acronym_policy(mut self, policy: impl AcronymCoverage + 'static) -> Self {
        self.acronym_policy = Box::new(policy);
        self
    }
}

/// Detection and linking pipeline compiled against one catalog. Matchers are
/// built once in `new`; `find_anchors` can then run on any number of
/// documents, including from several threads at once.
pub struct AnchorEngine {
    catalog: Arc<CatalogIndex>,
    config: EngineConfig,
    people: Vec<Box<dyn Detector>>,
    blocks: BlockMatchers,
}

impl AnchorEngine {
    pub fn new(catalog: Arc<CatalogIndex>, config: EngineConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.fuzzy_threshold) {
            bail!(
                "fuzzy threshold must be within [0, 1], got {}",
                config.fuzzy_threshold
            );
        }

        let names = build_alias_regex(catalog.fullname_to_person.keys().map(String::as_str))
            .context("failed to build person name matcher")?;
        let units = build_alias_regex(catalog.unit_by_label.keys().map(String::as_str))
            .context("failed to build unit label matcher")?;
        let procedures = build_alias_regex(catalog.procedure_by_alias.keys().map(String::as_str))
            .context("failed to build procedure alias matcher")?;

        info!(
            person_names = names.alias_count(),
            unit_labels = units.alias_count(),
            procedure_aliases = procedures.alias_count(),
            fuzzy_threshold = config.fuzzy_threshold,
            similarity = config.similarity.as_str(),
            "compiled anchor matchers"
        );

        let people: Vec<Box<dyn Detector>> = vec![
            Box::new(EmailDetector::new()?),
            Box::new(PhoneDetector::new()?),
            Box::new(PersonNameDetector::new(names)),
        ];
        let blocks = BlockMatchers {
            units,
            procedures,
            unit_aliases: AliasTable::from_alias_map(&catalog.unit_by_label),
            procedure_aliases: AliasTable::from_alias_map(&catalog.procedure_by_alias),
        };

        Ok(Self {
            catalog,
            config,
            people,
            blocks,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every pass over `doc` in order, mutating it with annotation
    /// wrappers, and returns the linked and dropped anchors.
    pub fn find_anchors(&self, doc: &mut Document) -> AnchorSet {
        let mut anchors = self.find_people_anchors(doc);
        anchors.extend(self.find_block_anchors(doc));

        self.config.palette.apply(&mut anchors.linked);
        self.config.palette.apply(&mut anchors.dropped);
        anchors
    }

    fn find_people_anchors(&self, doc: &mut Document) -> AnchorSet {
        let mut candidates = Vec::new();
        for detector in &self.people {
            let found = detector.detect_links(doc);
            debug!(kind = %detector.kind(), count = found.len(), "link candidates");
            candidates.extend(found);
        }
        for detector in &self.people {
            let found = detector.detect_text(doc);
            debug!(kind = %detector.kind(), count = found.len(), "text candidates");
            candidates.extend(found);
        }
        link_anchors(candidates, &self.catalog)
    }

    fn find_block_anchors(&self, doc: &mut Document) -> AnchorSet {
        let pass = BlockPass {
            catalog: &self.catalog,
            matchers: &self.blocks,
            similarity: self.config.similarity,
            threshold: self.config.fuzzy_threshold,
            acronym_policy: self.config.acronym_policy.as_ref(),
        };
        let candidates = pass.run(doc);
        link_anchors(candidates, &self.catalog)
    }
}
