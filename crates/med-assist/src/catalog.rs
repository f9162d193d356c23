/// Drug catalog loader.
///
/// Resolves the dataset from, in order: a configured HTTP URL, a configured
/// file path, or the built-in sample set. Any transport or parse failure
/// falls straight through to the built-in set — the data is static, so a
/// retried fetch is not expected to change the outcome, and downstream
/// components must always have a non-empty catalog to work with.
///
/// The raw payload is fingerprinted with SHA-256 so a later refresh can tell
/// "fetched the same bytes" apart from "content actually changed".
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::index::SearchIndex;
use crate::model::DrugRecord;

const FETCH_DEADLINE: Duration = Duration::from_secs(30);

/// Where the current catalog came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Remote(String),
    File(String),
    Builtin,
}

impl CatalogSource {
    pub fn label(&self) -> &'static str {
        match self {
            CatalogSource::Remote(_) => "remote",
            CatalogSource::File(_) => "file",
            CatalogSource::Builtin => "builtin",
        }
    }
}

/// A successfully resolved catalog plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub records: Vec<DrugRecord>,
    pub fingerprint: String,
    pub source: CatalogSource,
}

/// Catalog plus the search index derived from it. Swapped wholesale on
/// refresh; read-only in between.
pub struct CatalogState {
    pub records: Vec<DrugRecord>,
    pub index: SearchIndex,
    pub fingerprint: String,
    pub source: CatalogSource,
}

impl CatalogState {
    pub fn from_loaded(loaded: LoadedCatalog) -> Self {
        let index = SearchIndex::build(&loaded.records);
        Self {
            records: loaded.records,
            index,
            fingerprint: loaded.fingerprint,
            source: loaded.source,
        }
    }
}

pub struct CatalogLoader {
    config: Config,
    http: reqwest::Client,
}

impl CatalogLoader {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent("med-assist/catalog")
            .build()
            .map_err(med_common::error::CommonError::from)?;
        Ok(Self { config, http })
    }

    /// Load the catalog. Never fails: a single failed attempt against the
    /// configured source degrades to the built-in sample set.
    pub async fn load(&self) -> LoadedCatalog {
        if let Some(url) = self.config.catalog_url.clone() {
            match self.load_remote(&url).await {
                Ok(loaded) => return loaded,
                Err(e) => {
                    warn!(url = %url, error = %e, "remote catalog load failed, degrading");
                }
            }
        }

        if let Some(path) = self.config.catalog_path.clone() {
            match load_file(&path) {
                Ok(loaded) => return loaded,
                Err(e) => {
                    warn!(path = %path, error = %e, "file catalog load failed, degrading");
                }
            }
        }

        info!("using built-in sample catalog");
        builtin_catalog()
    }

    async fn load_remote(&self, url: &str) -> Result<LoadedCatalog, AppError> {
        let resp = self
            .http
            .get(url)
            .timeout(FETCH_DEADLINE)
            .send()
            .await
            .map_err(med_common::error::CommonError::from)?;

        if !resp.status().is_success() {
            return Err(AppError::Catalog(format!(
                "catalog source returned status {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(med_common::error::CommonError::from)?;
        let records = parse_records(&bytes)?;
        info!(records = records.len(), url = %url, "catalog loaded");
        Ok(LoadedCatalog {
            fingerprint: fingerprint(&bytes),
            records,
            source: CatalogSource::Remote(url.to_string()),
        })
    }
}

fn load_file(path: &str) -> Result<LoadedCatalog, AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Catalog(format!("read {path}: {e}")))?;
    let records = parse_records(&bytes)?;
    info!(records = records.len(), path = %path, "catalog loaded");
    Ok(LoadedCatalog {
        fingerprint: fingerprint(&bytes),
        records,
        source: CatalogSource::File(path.to_string()),
    })
}

/// Parse a JSON array of catalog entries, cleaning text fields and dropping
/// rows with an empty generic name. Malformed optional fields never fail the
/// parse; a partial catalog beats no catalog.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<DrugRecord>, AppError> {
    let raw: Vec<DrugRecord> = serde_json::from_slice(bytes)
        .map_err(|e| AppError::Catalog(format!("parse catalog JSON: {e}")))?;

    let ws = Regex::new(r"\s+").expect("valid regex");
    let mut records = Vec::with_capacity(raw.len());
    for mut record in raw {
        record.generic_name = clean(&ws, &record.generic_name);
        if record.generic_name.is_empty() {
            continue;
        }
        record.brand_names = clean(&ws, &record.brand_names);
        record.drug_classes = clean(&ws, &record.drug_classes);
        record.medical_condition = record
            .medical_condition
            .as_deref()
            .map(|s| clean(&ws, s))
            .filter(|s| !s.is_empty());
        record.side_effects = record
            .side_effects
            .as_deref()
            .map(|s| clean(&ws, s))
            .filter(|s| !s.is_empty());
        records.push(record);
    }
    Ok(records)
}

fn clean(ws: &Regex, value: &str) -> String {
    ws.replace_all(value, " ").trim().to_string()
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// The deterministic fallback set. Taken from the sample rows the original
/// service shipped for offline development; downstream search, autocomplete
/// and tier-3 recommendations all keep working against it.
pub fn builtin_catalog() -> LoadedCatalog {
    let records = builtin_records();
    LoadedCatalog {
        fingerprint: "builtin".to_string(),
        records,
        source: CatalogSource::Builtin,
    }
}

pub fn builtin_records() -> Vec<DrugRecord> {
    fn record(
        generic_name: &str,
        brand_names: &str,
        drug_classes: &str,
        rx_otc: &str,
        pregnancy_category: &str,
        rating: f64,
        medical_condition: &str,
        side_effects: &str,
    ) -> DrugRecord {
        DrugRecord {
            generic_name: generic_name.to_string(),
            brand_names: brand_names.to_string(),
            drug_classes: drug_classes.to_string(),
            activity: String::new(),
            rx_otc: rx_otc.to_string(),
            pregnancy_category: pregnancy_category.to_string(),
            csa: "N".to_string(),
            alcohol: String::new(),
            rating,
            medical_condition: Some(medical_condition.to_string()),
            side_effects: Some(side_effects.to_string()),
        }
    }

    vec![
        record(
            "acetaminophen",
            "Tylenol, Panadol",
            "Analgesics, Antipyretics",
            "OTC",
            "C",
            7.0,
            "Pain relief, fever reduction",
            "Liver damage with overdose, nausea",
        ),
        record(
            "ibuprofen",
            "Advil, Motrin",
            "Nonsteroidal anti-inflammatory drugs",
            "Rx/OTC",
            "C",
            7.5,
            "Pain, inflammation",
            "Stomach upset, increased bleeding risk",
        ),
        record(
            "aspirin",
            "Bayer, Ecotrin",
            "Salicylates, Platelet aggregation inhibitors",
            "OTC",
            "D",
            6.8,
            "Pain, blood thinning",
            "Stomach irritation, bleeding risk",
        ),
        record(
            "metformin",
            "Glucophage",
            "Biguanides",
            "Rx",
            "B",
            7.2,
            "Type 2 diabetes",
            "Nausea, diarrhea, metallic taste",
        ),
        record(
            "lisinopril",
            "Prinivil, Zestril",
            "ACE inhibitors",
            "Rx",
            "D",
            6.9,
            "High blood pressure",
            "Dizziness, dry cough",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_at_least_two_records() {
        let loaded = builtin_catalog();
        assert!(loaded.records.len() >= 2);
        assert!(loaded.records.iter().all(|r| !r.generic_name.is_empty()));
        assert_eq!(loaded.source, CatalogSource::Builtin);
    }

    #[test]
    fn parse_drops_rows_with_empty_generic_name() {
        let json = r#"[
            {"generic_name": "aspirin", "rating": 6.8},
            {"generic_name": "   ", "rating": 1.0},
            {"generic_name": "metformin", "rating": 7.2}
        ]"#;
        let records = parse_records(json.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].generic_name, "aspirin");
        assert_eq!(records[1].generic_name, "metformin");
    }

    #[test]
    fn parse_collapses_whitespace_and_blanks_empty_optionals() {
        let json = r#"[{
            "generic_name": "  doxycycline ",
            "brand_names": "Vibramycin,\n  Doryx",
            "medical_condition": "Acne,\r\nbacterial infection",
            "side_effects": "   "
        }]"#;
        let records = parse_records(json.as_bytes()).unwrap();
        assert_eq!(records[0].generic_name, "doxycycline");
        assert_eq!(records[0].brand_names, "Vibramycin, Doryx");
        assert_eq!(
            records[0].medical_condition.as_deref(),
            Some("Acne, bacterial infection")
        );
        assert!(records[0].side_effects.is_none());
    }

    #[test]
    fn parse_rejects_non_array_payload() {
        assert!(parse_records(br#"{"not": "an array"}"#).is_err());
    }

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = fingerprint(b"[]");
        let b = fingerprint(b"[]");
        let c = fingerprint(b"[{}]");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn state_from_loaded_builds_index() {
        let state = CatalogState::from_loaded(builtin_catalog());
        assert_eq!(state.records.len(), builtin_records().len());
        assert!(state.index.drug_names.contains(&"aspirin".to_string()));
        assert_eq!(state.fingerprint, "builtin");
    }
}
