use tracing::debug;

use crate::catalog::CatalogIndex;
use crate::model::{Anchor, AnchorSet};

const UNLINKED_SUFFIX: &str = "|unlinked";

/// Resolves candidates that carry no id yet and partitions them. Anchors that
/// stay without an id are moved to `dropped` with their source marked.
pub fn link_anchors(candidates: Vec<Anchor>, catalog: &CatalogIndex) -> AnchorSet {
    let mut set = AnchorSet::default();

    for mut anchor in candidates {
        if anchor.per_id.is_none() {
            anchor.per_id = catalog
                .resolve(anchor.kind, &anchor.value)
                .map(ToOwned::to_owned);
        }

        match anchor.per_id.as_deref() {
            Some(id) => {
                if anchor.name.is_none() {
                    anchor.name = catalog.display_name(anchor.kind, id).map(ToOwned::to_owned);
                }
                set.linked.push(anchor);
            }
            None => {
                anchor.name = None;
                if !anchor.source.ends_with(UNLINKED_SUFFIX) {
                    anchor.source.push_str(UNLINKED_SUFFIX);
                }
                set.dropped.push(anchor);
            }
        }
    }

    debug!(
        linked = set.linked.len(),
        dropped = set.dropped.len(),
        "linked anchor candidates"
    );
    set
}
