use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use med_common::backend::SemanticMatch;

/// A single catalog entry from the drugs dataset.
///
/// Loaded once per process lifetime and never mutated afterwards. Original
/// casing is preserved for display; matching and indexing lower-case on the
/// fly. `brand_names` and `drug_classes` are comma-separated lists as they
/// appear in the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DrugRecord {
    /// Generic name, e.g. "acetaminophen". Never empty in a valid entry.
    pub generic_name: String,
    /// Comma-separated brand names, e.g. "Tylenol, Panadol". May be empty.
    #[serde(default)]
    pub brand_names: String,
    /// Comma-separated drug classes, e.g. "Analgesics, Antipyretics".
    #[serde(default)]
    pub drug_classes: String,
    /// Activity level as reported by the source dataset.
    #[serde(default)]
    pub activity: String,
    /// Legal status: "Rx", "OTC" or "Rx/OTC".
    #[serde(default)]
    pub rx_otc: String,
    /// Pregnancy-risk category: A, B, C, D, X or N.
    #[serde(default)]
    pub pregnancy_category: String,
    /// Controlled-substance schedule: N, U, M or 1..5.
    #[serde(default)]
    pub csa: String,
    /// Alcohol-interaction flag: "X" or empty.
    #[serde(default)]
    pub alcohol: String,
    /// Community rating, 0-10.
    #[serde(default)]
    pub rating: f64,
    pub medical_condition: Option<String>,
    pub side_effects: Option<String>,
}

/// A catalog record with its query relevance attached. Created per query,
/// never persisted. `score > 0` always comes with at least one reason.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub record: DrugRecord,
    pub score: u32,
    pub match_reasons: Vec<String>,
}

/// Structured filters for catalog search. Every field is optional; an absent
/// filter imposes no constraint.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchFilters {
    /// Exact legal-status match ("Rx", "OTC", "Rx/OTC").
    pub rx_otc: Option<String>,
    /// Exact pregnancy-category match (A, B, C, D, X, N).
    pub pregnancy_category: Option<String>,
    /// Minimum rating threshold (0-10).
    pub min_rating: Option<f64>,
    /// Substring match against the drug-class list.
    pub drug_class: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.rx_otc.is_none()
            && self.pregnancy_category.is_none()
            && self.min_rating.is_none()
            && self.drug_class.is_none()
    }
}

/// Which index set an autocomplete candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    DrugName,
    BrandName,
    Condition,
    DrugClass,
}

/// A single autocomplete candidate with the number of catalog rows backing it.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AutocompleteSuggestion {
    pub value: String,
    pub kind: SuggestionKind,
    pub count: usize,
}

/// Autocomplete scope: drug-oriented sets or the conditions set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestMode {
    Drug,
    Condition,
}

/// Envelope status. Invalid input and unknown capabilities are rejected as
/// tool errors before an envelope exists, and Tier 3 cannot fail, so every
/// envelope that reaches a client reports success; degraded answers are
/// flagged via `degraded`, not via status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Success,
}

/// Tier source labels carried in every envelope.
pub mod source {
    pub const MEDICAL_API: &str = "medical_api";
    pub const GROQ: &str = "groq";
    pub const STATIC_FALLBACK: &str = "static_fallback";
    pub const LOCAL_CATALOG: &str = "local_catalog";
}

/// The normalized response contract for every capability.
///
/// Whichever tier answered, its raw shape is mapped into a typed payload
/// before this envelope leaves the orchestrator; callers never branch on the
/// producing tier. `degraded` is set only when both real tiers failed and
/// the payload was synthesized statically.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RetrievalEnvelope<T> {
    pub status: RetrievalStatus,
    /// Which tier produced the payload: `medical_api`, `groq`,
    /// `static_fallback` or `local_catalog`.
    pub source: String,
    pub degraded: bool,
    /// RFC 3339 generation timestamp.
    pub timestamp: String,
    pub payload: T,
}

impl<T> RetrievalEnvelope<T> {
    pub fn success(source: &str, payload: T) -> Self {
        Self {
            status: RetrievalStatus::Success,
            source: source.to_string(),
            degraded: false,
            timestamp: now_rfc3339(),
            payload,
        }
    }

    /// Tier-3 envelope: both real tiers failed, the payload is synthetic.
    pub fn degraded_fallback(payload: T) -> Self {
        Self {
            status: RetrievalStatus::Success,
            source: source::STATIC_FALLBACK.to_string(),
            degraded: true,
            timestamp: now_rfc3339(),
            payload,
        }
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// --- Capability payloads ---

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QaPayload {
    pub question: String,
    pub answer: String,
    pub context_preview: Option<String>,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RecommendationPayload {
    pub symptoms: Vec<String>,
    pub additional_info: String,
    pub recommendations: String,
    pub matches: Vec<SemanticMatch>,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RemoteSearchPayload {
    pub query: String,
    pub results: Vec<SemanticMatch>,
    pub total_results: usize,
    /// Generated prose summary; present when the generative tier answered.
    pub summary: Option<String>,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CatalogSearchPayload {
    pub query: String,
    pub results: Vec<ScoredResult>,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ServiceStatusPayload {
    /// "connected" or "unreachable".
    pub backend: String,
    pub backend_detail: Option<String>,
    pub groq_configured: bool,
    pub catalog_records: usize,
    pub catalog_source: String,
    pub catalog_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drug_record_deserializes_with_missing_optionals() {
        let json = r#"{"generic_name": "aspirin", "rating": 6.2}"#;
        let record: DrugRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.generic_name, "aspirin");
        assert_eq!(record.rating, 6.2);
        assert!(record.brand_names.is_empty());
        assert!(record.medical_condition.is_none());
    }

    #[test]
    fn envelope_success_is_not_degraded() {
        let env = RetrievalEnvelope::success(source::MEDICAL_API, 42u32);
        assert_eq!(env.status, RetrievalStatus::Success);
        assert_eq!(env.source, source::MEDICAL_API);
        assert!(!env.degraded);
        assert!(!env.timestamp.is_empty());
    }

    #[test]
    fn fallback_envelope_is_marked_degraded() {
        let env = RetrievalEnvelope::degraded_fallback("canned");
        assert_eq!(env.status, RetrievalStatus::Success);
        assert_eq!(env.source, source::STATIC_FALLBACK);
        assert!(env.degraded);
    }

    #[test]
    fn empty_filters_report_empty() {
        assert!(SearchFilters::default().is_empty());
        let filters = SearchFilters {
            rx_otc: Some("OTC".to_string()),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }

    #[test]
    fn every_envelope_serializes_status_success() {
        let value =
            serde_json::to_value(RetrievalEnvelope::success(source::LOCAL_CATALOG, 1u32)).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["degraded"], false);

        let value = serde_json::to_value(RetrievalEnvelope::degraded_fallback(1u32)).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["degraded"], true);
    }

    #[test]
    fn suggestion_kind_uses_snake_case_tags() {
        let json = serde_json::to_value(SuggestionKind::DrugName).unwrap();
        assert_eq!(json, "drug_name");
    }
}
