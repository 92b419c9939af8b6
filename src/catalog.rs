use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{info, warn};

use crate::fold::fold;
use crate::model::{AnchorKind, CatalogSummary};

#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    pub email_to_person: HashMap<String, String>,
    pub phone_to_person: HashMap<String, String>,
    pub fullname_to_person: HashMap<String, String>,
    pub person_names: HashMap<String, String>,
    pub unit_by_label: HashMap<String, String>,
    pub unit_names: HashMap<String, String>,
    pub procedure_by_alias: HashMap<String, String>,
    pub procedure_names: HashMap<String, String>,
    pub procedure_acronyms: HashMap<String, Vec<String>>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CatalogId {
    Number(i64),
    Text(String),
}

impl CatalogId {
    fn into_key(self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.trim().to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    people: PeopleSection,
    units: UnitSection,
    procedures: ProcedureSection,
    meta: CatalogMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PeopleSection {
    by_email: BTreeMap<String, CatalogId>,
    by_phone: BTreeMap<String, CatalogId>,
    by_name: BTreeMap<String, CatalogId>,
    names: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UnitSection {
    by_label: BTreeMap<String, CatalogId>,
    names: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProcedureSection {
    by_alias: BTreeMap<String, CatalogId>,
    names: BTreeMap<String, String>,
    acronyms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogMeta {
    version: Option<String>,
}

impl CatalogIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = Self::from_json_slice(&raw)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;

        if catalog.is_empty() {
            warn!(path = %path.display(), "catalog has no entries; every anchor will be dropped");
        }
        info!(
            path = %path.display(),
            emails = catalog.email_to_person.len(),
            phones = catalog.phone_to_person.len(),
            names = catalog.fullname_to_person.len(),
            units = catalog.unit_by_label.len(),
            procedures = catalog.procedure_by_alias.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let file: CatalogFile = serde_json::from_slice(raw).context("invalid catalog json")?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self {
            version: file.meta.version,
            ..Self::default()
        };

        for (email, id) in file.people.by_email {
            let key = email.trim().to_lowercase();
            if !key.is_empty() {
                catalog.email_to_person.insert(key, id.into_key());
            }
        }
        for (phone, id) in file.people.by_phone {
            if let Some(key) = catalog_phone_key(&phone) {
                catalog.phone_to_person.insert(key, id.into_key());
            }
        }
        insert_folded(&mut catalog.fullname_to_person, file.people.by_name);
        insert_folded(&mut catalog.unit_by_label, file.units.by_label);
        insert_folded(&mut catalog.procedure_by_alias, file.procedures.by_alias);

        catalog.person_names = trimmed_names(file.people.names);
        catalog.unit_names = trimmed_names(file.units.names);
        catalog.procedure_names = trimmed_names(file.procedures.names);
        catalog.procedure_acronyms = file
            .procedures
            .acronyms
            .into_iter()
            .map(|(id, acronyms)| {
                let acronyms = acronyms
                    .into_iter()
                    .map(|acronym| acronym.trim().to_string())
                    .filter(|acronym| !acronym.is_empty())
                    .collect::<Vec<String>>();
                (id.trim().to_string(), acronyms)
            })
            .filter(|(_, acronyms)| !acronyms.is_empty())
            .collect();

        catalog
    }

    pub fn is_empty(&self) -> bool {
        self.email_to_person.is_empty()
            && self.phone_to_person.is_empty()
            && self.fullname_to_person.is_empty()
            && self.unit_by_label.is_empty()
            && self.procedure_by_alias.is_empty()
    }

    pub fn resolve(&self, kind: AnchorKind, value: &str) -> Option<&str> {
        let found = match kind {
            AnchorKind::Email => self.email_to_person.get(&value.trim().to_lowercase()),
            AnchorKind::Phone => self.phone_to_person.get(value.trim()),
            AnchorKind::PersonName => self.fullname_to_person.get(&fold(value)),
            AnchorKind::Unit => self.unit_by_label.get(&fold(value)),
            AnchorKind::Procedure => self.procedure_by_alias.get(&fold(value)),
        };
        found.map(String::as_str)
    }

    pub fn display_name(&self, kind: AnchorKind, id: &str) -> Option<&str> {
        let names = match kind {
            AnchorKind::Email | AnchorKind::Phone | AnchorKind::PersonName => &self.person_names,
            AnchorKind::Unit => &self.unit_names,
            AnchorKind::Procedure => &self.procedure_names,
        };
        names.get(id).map(String::as_str)
    }

    pub fn acronyms(&self, procedure_id: &str) -> &[String] {
        self.procedure_acronyms
            .get(procedure_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn summary(&self, path: &Path, sha256: String) -> CatalogSummary {
        CatalogSummary {
            path: path.display().to_string(),
            sha256,
            version: self.version.clone(),
            people_emails: self.email_to_person.len(),
            people_phones: self.phone_to_person.len(),
            people_names: self.fullname_to_person.len(),
            unit_labels: self.unit_by_label.len(),
            procedure_aliases: self.procedure_by_alias.len(),
            procedures_with_acronyms: self.procedure_acronyms.len(),
        }
    }
}

/// Loads a catalog at most once per process; later calls for the same path
/// share the first instance.
pub fn load_shared(path: &Path) -> Result<Arc<CatalogIndex>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<CatalogIndex>>>> = OnceLock::new();

    let key = fs::canonicalize(path)
        .with_context(|| format!("catalog not found: {}", path.display()))?;
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache
        .lock()
        .map_err(|_| anyhow!("catalog cache lock poisoned"))?;

    if let Some(catalog) = guard.get(&key) {
        return Ok(Arc::clone(catalog));
    }

    let catalog = Arc::new(CatalogIndex::load(&key)?);
    guard.insert(key, Arc::clone(&catalog));
    Ok(catalog)
}

fn insert_folded(target: &mut HashMap<String, String>, source: BTreeMap<String, CatalogId>) {
    for (key, id) in source {
        let folded = fold(&key);
        if !folded.is_empty() {
            target.insert(folded, id.into_key());
        }
    }
}

fn trimmed_names(source: BTreeMap<String, String>) -> HashMap<String, String> {
    source
        .into_iter()
        .map(|(id, name)| (id.trim().to_string(), name.trim().to_string()))
        .filter(|(_, name)| !name.is_empty())
        .collect()
}

fn catalog_phone_key(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 9 {
        return None;
    }
    Some(digits[digits.len() - 9..].to_string())
}

#[cfg(test)]
impl CatalogIndex {
    pub fn with_person(mut self, id: &str, name: &str) -> Self {
        self.fullname_to_person.insert(fold(name), id.to_string());
        self.person_names.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_email(mut self, email: &str, id: &str) -> Self {
        self.email_to_person
            .insert(email.to_lowercase(), id.to_string());
        self
    }

    pub fn with_phone(mut self, nsn: &str, id: &str) -> Self {
        self.phone_to_person.insert(nsn.to_string(), id.to_string());
        self
    }

    pub fn with_unit(mut self, label: &str, id: &str, name: &str) -> Self {
        self.unit_by_label.insert(fold(label), id.to_string());
        self.unit_names.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_procedure(mut self, alias: &str, id: &str, name: &str) -> Self {
        self.procedure_by_alias.insert(fold(alias), id.to_string());
        self.procedure_names.insert(id.to_string(), name.to_string());
        self
    }

    pub fn with_acronyms(mut self, id: &str, acronyms: &[&str]) -> Self {
        self.procedure_acronyms.insert(
            id.to_string(),
            acronyms.iter().map(|acronym| acronym.to_string()).collect(),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_slice_reads_refresh_output_with_numeric_ids() {
        let raw = r#"
        {
          "people": {
            "by_email": {"Jan.Kowalski@Example.com": 42},
            "by_phone": {"+48 58 347 12 34": 42},
            "by_name": {"Jan Kowalski": 42, "kowalski jan": 42},
            "names": {"42": "Jan Kowalski"}
          },
          "units": {"by_label": {"Dziekanat Wydziału X": 7}},
          "procedures": {
            "by_alias": {"rejestracja na semestr": "p-3"},
            "acronyms": {"p-3": ["RS", " "], "p-9": []}
          },
          "meta": {"version": "2025-01-01T00:00:00+00:00", "counts": {"people": 1}}
        }
        "#;

        let catalog = CatalogIndex::from_json_slice(raw.as_bytes()).expect("catalog parses");
        assert_eq!(
            catalog.email_to_person.get("jan.kowalski@example.com"),
            Some(&"42".to_string())
        );
        assert_eq!(catalog.phone_to_person.get("583471234"), Some(&"42".to_string()));
        assert_eq!(catalog.resolve(AnchorKind::PersonName, "JAN  Kowalski"), Some("42"));
        assert_eq!(catalog.resolve(AnchorKind::PersonName, "Kowalski Jan"), Some("42"));
        assert_eq!(catalog.resolve(AnchorKind::Unit, "dziekanat wydzialu x"), Some("7"));
        assert_eq!(catalog.display_name(AnchorKind::Email, "42"), Some("Jan Kowalski"));
        assert_eq!(catalog.acronyms("p-3"), &["RS".to_string()]);
        assert!(catalog.acronyms("p-9").is_empty());
        assert_eq!(catalog.version.as_deref(), Some("2025-01-01T00:00:00+00:00"));
    }

    #[test]
    fn from_json_slice_accepts_missing_sections() {
        let catalog = CatalogIndex::from_json_slice(b"{}").expect("empty catalog parses");
        assert!(catalog.is_empty());
        assert_eq!(catalog.resolve(AnchorKind::Email, "a@b.pl"), None);
    }

    #[test]
    fn from_json_slice_rejects_malformed_input() {
        assert!(CatalogIndex::from_json_slice(b"[1, 2").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let error = load_shared(Path::new("/nonexistent/anchor_catalog.json"))
            .expect_err("missing catalog must fail");
        assert!(error.to_string().contains("catalog not found"));
    }

    #[test]
    fn catalog_phone_key_keeps_last_nine_digits() {
        assert_eq!(catalog_phone_key("+48 58 347 12 34").as_deref(), Some("583471234"));
        assert_eq!(catalog_phone_key("12 34"), None);
    }
}
