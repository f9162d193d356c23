/// Relevance scorer for on-device catalog search.
///
/// Weighted substring scoring over five record fields, with structured
/// filters applied after scoring. Sorting is stable with respect to catalog
/// order, so equal scores keep their dataset ordering.
use crate::model::{DrugRecord, ScoredResult, SearchFilters};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const DEFAULT_CONDITION_LIMIT: usize = 15;

const WEIGHT_NAME: u32 = 100;
const WEIGHT_NAME_EXACT_BONUS: u32 = 200;
const WEIGHT_BRAND: u32 = 80;
const WEIGHT_CONDITION: u32 = 70;
const WEIGHT_CLASS: u32 = 60;
const WEIGHT_SIDE_EFFECTS: u32 = 40;

// Condition-scoped search uses its own, narrower weighting.
const CONDITION_WEIGHT_CONDITION: u32 = 100;
const CONDITION_WEIGHT_CLASS: u32 = 60;

/// Free-text search with optional structured filters.
///
/// A record is returned only if its cumulative score is strictly positive
/// and every supplied filter passes. Empty or whitespace-only queries return
/// nothing without touching the catalog.
pub fn search(
    records: &[DrugRecord],
    query: &str,
    filters: &SearchFilters,
    limit: Option<usize>,
) -> Vec<ScoredResult> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let mut results: Vec<ScoredResult> = records
        .iter()
        .filter_map(|record| score_record(record, &q))
        .filter(|result| passes_filters(&result.record, filters))
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(limit);
    results
}

/// Condition-scoped search: two fields only, no filters.
pub fn search_by_condition(
    records: &[DrugRecord],
    condition: &str,
    limit: Option<usize>,
) -> Vec<ScoredResult> {
    let c = condition.trim().to_lowercase();
    if c.is_empty() {
        return Vec::new();
    }
    let limit = limit.unwrap_or(DEFAULT_CONDITION_LIMIT);

    let mut results: Vec<ScoredResult> = records
        .iter()
        .filter_map(|record| {
            let mut score = 0;
            let mut reasons = Vec::new();

            if contains(record.medical_condition.as_deref(), &c) {
                score += CONDITION_WEIGHT_CONDITION;
                reasons.push("Treats this condition".to_string());
            }
            if record.drug_classes.to_lowercase().contains(&c) {
                score += CONDITION_WEIGHT_CLASS;
                reasons.push("Drug class match".to_string());
            }

            (score > 0).then(|| ScoredResult {
                record: record.clone(),
                score,
                match_reasons: reasons,
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(limit);
    results
}

fn score_record(record: &DrugRecord, q: &str) -> Option<ScoredResult> {
    let mut score = 0;
    let mut reasons = Vec::new();

    let name = record.generic_name.to_lowercase();
    if name.contains(q) {
        score += WEIGHT_NAME;
        reasons.push("Drug name match".to_string());
        if name == q {
            score += WEIGHT_NAME_EXACT_BONUS;
            reasons.push("Exact drug name match".to_string());
        }
    }
    if record.brand_names.to_lowercase().contains(q) {
        score += WEIGHT_BRAND;
        reasons.push("Brand name match".to_string());
    }
    if contains(record.medical_condition.as_deref(), q) {
        score += WEIGHT_CONDITION;
        reasons.push("Treats this condition".to_string());
    }
    if record.drug_classes.to_lowercase().contains(q) {
        score += WEIGHT_CLASS;
        reasons.push("Drug class match".to_string());
    }
    if contains(record.side_effects.as_deref(), q) {
        score += WEIGHT_SIDE_EFFECTS;
        reasons.push("Mentioned in side effects".to_string());
    }

    (score > 0).then(|| ScoredResult {
        record: record.clone(),
        score,
        match_reasons: reasons,
    })
}

/// Missing optional fields never match; they are not errors.
fn contains(field: Option<&str>, needle: &str) -> bool {
    field
        .map(|s| s.to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn passes_filters(record: &DrugRecord, filters: &SearchFilters) -> bool {
    if let Some(rx_otc) = &filters.rx_otc {
        if !record.rx_otc.eq_ignore_ascii_case(rx_otc) {
            return false;
        }
    }
    if let Some(category) = &filters.pregnancy_category {
        if !record.pregnancy_category.eq_ignore_ascii_case(category) {
            return false;
        }
    }
    if let Some(min_rating) = filters.min_rating {
        if record.rating < min_rating {
            return false;
        }
    }
    if let Some(class) = &filters.drug_class {
        if !record
            .drug_classes
            .to_lowercase()
            .contains(&class.trim().to_lowercase())
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_records;

    fn catalog() -> Vec<DrugRecord> {
        builtin_records()
    }

    #[test]
    fn empty_query_returns_nothing() {
        let records = catalog();
        assert!(search(&records, "", &SearchFilters::default(), None).is_empty());
        assert!(search(&records, "   ", &SearchFilters::default(), None).is_empty());
        assert!(search_by_condition(&records, "\t", None).is_empty());
    }

    #[test]
    fn exact_name_match_scores_at_least_300_and_ranks_first() {
        let records = catalog();
        let results = search(&records, "aspirin", &SearchFilters::default(), None);
        assert!(!results.is_empty());
        assert_eq!(results[0].record.generic_name, "aspirin");
        assert!(results[0].score >= 300, "score was {}", results[0].score);
        assert!(results
            .iter()
            .all(|r| r.record.generic_name != "acetaminophen"));
    }

    #[test]
    fn every_result_has_positive_score_and_reasons() {
        let records = catalog();
        for query in ["pain", "advil", "ace", "nausea"] {
            for result in search(&records, query, &SearchFilters::default(), None) {
                assert!(result.score >= 1);
                assert!(
                    !result.match_reasons.is_empty(),
                    "query {query:?} produced a result with no reasons"
                );
            }
        }
    }

    #[test]
    fn brand_name_match_scores_80() {
        let records = catalog();
        let results = search(&records, "advil", &SearchFilters::default(), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.generic_name, "ibuprofen");
        assert_eq!(results[0].score, 80);
        assert_eq!(results[0].match_reasons, vec!["Brand name match"]);
    }

    #[test]
    fn otc_filter_never_yields_rx_only_records() {
        let records = catalog();
        let filters = SearchFilters {
            rx_otc: Some("OTC".to_string()),
            ..Default::default()
        };
        let results = search(&records, "pain", &filters, None);
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.record.rx_otc.eq_ignore_ascii_case("OTC")));
    }

    #[test]
    fn min_rating_and_class_filters_apply() {
        let records = catalog();
        let filters = SearchFilters {
            min_rating: Some(7.0),
            drug_class: Some("analgesics".to_string()),
            ..Default::default()
        };
        let results = search(&records, "pain", &filters, None);
        assert!(results
            .iter()
            .all(|r| r.record.rating >= 7.0
                && r.record.drug_classes.to_lowercase().contains("analgesics")));
    }

    #[test]
    fn results_are_sorted_by_descending_score_and_truncated() {
        let records = catalog();
        let results = search(&records, "pain", &SearchFilters::default(), Some(2));
        assert!(results.len() <= 2);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn condition_search_matches_diabetes_with_expected_reason() {
        let mut records = catalog();
        records[3].medical_condition = Some("Type 2 Diabetes management".to_string());
        let results = search_by_condition(&records, "diabetes", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.generic_name, "metformin");
        assert_eq!(results[0].score, 100);
        assert_eq!(results[0].match_reasons, vec!["Treats this condition"]);
    }

    #[test]
    fn condition_search_applies_no_filters_and_default_limit() {
        let records = catalog();
        let results = search_by_condition(&records, "pain", None);
        assert!(results.len() <= DEFAULT_CONDITION_LIMIT);
        assert!(results.iter().all(|r| r.score > 0));
    }

    #[test]
    fn missing_optional_fields_do_not_match() {
        let mut record = catalog().remove(0);
        record.medical_condition = None;
        record.side_effects = None;
        let results = search(&[record], "nausea", &SearchFilters::default(), None);
        assert!(results.is_empty());
    }
}
