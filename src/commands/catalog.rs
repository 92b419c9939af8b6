use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::load_shared;
use crate::cli::CatalogArgs;
use crate::util::sha256_file;

pub fn run(args: CatalogArgs) -> Result<()> {
    info!(path = %args.catalog.display(), "catalog status requested");

    let catalog = load_shared(&args.catalog)?;
    let summary = catalog.summary(&args.catalog, sha256_file(&args.catalog)?);

    info!(
        path = %summary.path,
        sha256 = %summary.sha256,
        version = %summary.version.clone().unwrap_or_default(),
        people_emails = summary.people_emails,
        people_phones = summary.people_phones,
        people_names = summary.people_names,
        unit_labels = summary.unit_labels,
        procedure_aliases = summary.procedure_aliases,
        procedures_with_acronyms = summary.procedures_with_acronyms,
        "catalog summary"
    );

    let unnamed_people = catalog
        .fullname_to_person
        .values()
        .filter(|id| !catalog.person_names.contains_key(*id))
        .count();
    if unnamed_people > 0 {
        warn!(count = unnamed_people, "person ids without a display name");
    }
    if catalog.procedure_names.is_empty() && !catalog.procedure_by_alias.is_empty() {
        warn!("procedure aliases present but no procedure names");
    }

    Ok(())
}
