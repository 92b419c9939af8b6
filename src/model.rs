use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anchors::Similarity;
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Email,
    Phone,
    PersonName,
    Unit,
    Procedure,
}

impl AnchorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::PersonName => "person_name",
            Self::Unit => "unit",
            Self::Procedure => "procedure",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorColors {
    pub anchor: String,
    pub seed: String,
    pub region: String,
}

impl AnchorColors {
    pub fn new(anchor: &str, seed: &str, region: &str) -> Self {
        Self {
            anchor: anchor.to_string(),
            seed: seed.to_string(),
            region: region.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub kind: AnchorKind,
    pub per_id: Option<String>,
    pub name: Option<String>,
    pub node: NodeId,
    pub trigger_node: NodeId,
    pub value: String,
    pub source: String,
    pub score: Option<f64>,
    pub colors: Option<AnchorColors>,
}

impl Anchor {
    pub fn detected(
        kind: AnchorKind,
        node: NodeId,
        trigger_node: NodeId,
        value: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            per_id: None,
            name: None,
            node,
            trigger_node,
            value: value.into(),
            source: source.into(),
            score: None,
            colors: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_id(mut self, per_id: impl Into<String>, name: Option<&str>) -> Self {
        self.per_id = Some(per_id.into());
        self.name = name.map(ToOwned::to_owned);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    pub linked: Vec<Anchor>,
    pub dropped: Vec<Anchor>,
}

impl AnchorSet {
    pub fn extend(&mut self, other: AnchorSet) {
        self.linked.extend(other.linked);
        self.dropped.extend(other.dropped);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnchorRecord {
    pub kind: AnchorKind,
    pub per_id: Option<String>,
    pub name: Option<String>,
    pub value: String,
    pub source: String,
    pub score: Option<f64>,
    pub colors: Option<AnchorColors>,
    pub node: NodeId,
    pub node_tag: Option<String>,
    pub trigger_node: NodeId,
    pub trigger_text: String,
}

impl AnchorRecord {
    pub fn from_anchor(doc: &Document, anchor: &Anchor) -> Self {
        Self {
            kind: anchor.kind,
            per_id: anchor.per_id.clone(),
            name: anchor.name.clone(),
            value: anchor.value.clone(),
            source: anchor.source.clone(),
            score: anchor.score,
            colors: anchor.colors.clone(),
            node: anchor.node,
            node_tag: doc.tag_name(anchor.node).map(ToOwned::to_owned),
            trigger_node: anchor.trigger_node,
            trigger_text: doc.text_content(anchor.trigger_node, " "),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnchorCounts {
    pub linked: usize,
    pub dropped: usize,
    pub email: usize,
    pub phone: usize,
    pub person_name: usize,
    pub unit: usize,
    pub procedure: usize,
    pub fuzzy: usize,
}

impl AnchorCounts {
    pub fn from_set(anchors: &AnchorSet) -> Self {
        let mut counts = Self {
            linked: anchors.linked.len(),
            dropped: anchors.dropped.len(),
            ..Self::default()
        };
        for anchor in &anchors.linked {
            match anchor.kind {
                AnchorKind::Email => counts.email += 1,
                AnchorKind::Phone => counts.phone += 1,
                AnchorKind::PersonName => counts.person_name += 1,
                AnchorKind::Unit => counts.unit += 1,
                AnchorKind::Procedure => counts.procedure += 1,
            }
            if anchor.source.starts_with("fuzz:") {
                counts.fuzzy += 1;
            }
        }
        counts
    }

    pub fn add(&mut self, other: &AnchorCounts) {
        self.linked += other.linked;
        self.dropped += other.dropped;
        self.email += other.email;
        self.phone += other.phone;
        self.person_name += other.person_name;
        self.unit += other.unit;
        self.procedure += other.procedure;
        self.fuzzy += other.fuzzy;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnchorReport {
    pub report_version: u32,
    pub generated_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub counts: AnchorCounts,
    pub linked: Vec<AnchorRecord>,
    pub dropped: Vec<AnchorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub path: String,
    pub sha256: String,
    pub version: Option<String>,
    pub people_emails: usize,
    pub people_phones: usize,
    pub people_names: usize,
    pub unit_labels: usize,
    pub procedure_aliases: usize,
    pub procedures_with_acronyms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub source_path: String,
    pub status: String,
    pub report_path: Option<String>,
    pub annotated_html_path: Option<String>,
    pub counts: Option<AnchorCounts>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub command: String,
    pub catalog: CatalogSummary,
    pub fuzzy_threshold: f64,
    pub similarity: Similarity,
    pub document_count: usize,
    pub failed_document_count: usize,
    pub totals: AnchorCounts,
    pub documents: Vec<DocumentSummary>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfigFile {
    pub fuzzy_threshold: Option<f64>,
    pub similarity: Option<Similarity>,
    pub colors: Option<ColorPaletteFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorPaletteFile {
    pub schemes: Vec<AnchorColors>,
    pub fallback: Option<AnchorColors>,
}
