use sha2::{Digest, Sha256};

use crate::model::{Anchor, AnchorColors};

const DEFAULT_SCHEMES: &[(&str, &str, &str)] = &[
    ("#1565c0", "#90caf9", "#e3f2fd"),
    ("#2e7d32", "#a5d6a7", "#e8f5e9"),
    ("#c62828", "#ef9a9a", "#ffebee"),
    ("#6a1b9a", "#ce93d8", "#f3e5f5"),
    ("#ef6c00", "#ffcc80", "#fff3e0"),
    ("#00838f", "#80deea", "#e0f7fa"),
    ("#4e342e", "#bcaaa4", "#efebe9"),
    ("#ad1457", "#f48fb1", "#fce4ec"),
];
const DEFAULT_FALLBACK: (&str, &str, &str) = ("#616161", "#e0e0e0", "#f5f5f5");

#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    schemes: Vec<AnchorColors>,
    fallback: AnchorColors,
}

impl Default for ColorPalette {
    fn default() -> Self {
        let (anchor, seed, region) = DEFAULT_FALLBACK;
        Self {
            schemes: DEFAULT_SCHEMES
                .iter()
                .map(|(anchor, seed, region)| AnchorColors::new(anchor, seed, region))
                .collect(),
            fallback: AnchorColors::new(anchor, seed, region),
        }
    }
}

impl ColorPalette {
    pub fn new(schemes: Vec<AnchorColors>, fallback: Option<AnchorColors>) -> Self {
        Self {
            schemes,
            fallback: fallback.unwrap_or_else(|| Self::default().fallback),
        }
    }

    pub fn scheme_count(&self) -> usize {
        self.schemes.len()
    }

    pub fn colors_for(&self, per_id: Option<&str>) -> AnchorColors {
        per_id
            .and_then(|id| scheme_index(id, self.schemes.len()))
            .and_then(|index| self.schemes.get(index))
            .unwrap_or(&self.fallback)
            .clone()
    }

    pub fn apply(&self, anchors: &mut [Anchor]) {
        for anchor in anchors {
            anchor.colors = Some(self.colors_for(anchor.per_id.as_deref()));
        }
    }
}

/// Stable scheme slot for an entity id: the first four bytes of its SHA-256
/// digest, big-endian, modulo the number of schemes.
pub fn scheme_index(id: &str, scheme_count: usize) -> Option<usize> {
    if scheme_count == 0 {
        return None;
    }
    let digest = Sha256::digest(id.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Some(prefix as usize % scheme_count)
}
