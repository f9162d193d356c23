/// Autocomplete engine over the search index.
///
/// Candidates come from the index sets by substring containment; the
/// supporting row count is recomputed against the catalog on every call
/// rather than cached, since the sets are small and the counts keep
/// suggestions honest after a catalog refresh.
use crate::index::SearchIndex;
use crate::model::{AutocompleteSuggestion, DrugRecord, SuggestMode, SuggestionKind};

pub const DEFAULT_SUGGEST_LIMIT: usize = 10;
const MIN_QUERY_LEN: usize = 2;

const DRUG_NAME_CAP: usize = 5;
const BRAND_NAME_CAP: usize = 3;
const DRUG_CLASS_CAP: usize = 2;
const CONDITION_CAP: usize = 8;

/// Ranked suggestions for a partial input. Inputs shorter than two
/// characters return nothing.
pub fn suggest(
    index: &SearchIndex,
    records: &[DrugRecord],
    query: &str,
    mode: SuggestMode,
    limit: Option<usize>,
) -> Vec<AutocompleteSuggestion> {
    let q = query.trim().to_lowercase();
    if q.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }
    let limit = limit.unwrap_or(DEFAULT_SUGGEST_LIMIT);

    let mut suggestions = Vec::new();
    match mode {
        SuggestMode::Drug => {
            collect(
                &mut suggestions,
                records,
                &index.drug_names,
                &q,
                SuggestionKind::DrugName,
                DRUG_NAME_CAP,
            );
            collect(
                &mut suggestions,
                records,
                &index.brand_names,
                &q,
                SuggestionKind::BrandName,
                BRAND_NAME_CAP,
            );
            collect(
                &mut suggestions,
                records,
                &index.drug_classes,
                &q,
                SuggestionKind::DrugClass,
                DRUG_CLASS_CAP,
            );
        }
        SuggestMode::Condition => {
            collect(
                &mut suggestions,
                records,
                &index.conditions,
                &q,
                SuggestionKind::Condition,
                CONDITION_CAP,
            );
        }
    }

    // Prefix matches rank strictly before substring-only matches; within a
    // group, higher supporting count wins. Sort is stable, so ties keep the
    // index's lexicographic order.
    suggestions.sort_by_key(|s| {
        let prefix_rank = if s.value.starts_with(&q) { 0u8 } else { 1u8 };
        (prefix_rank, std::cmp::Reverse(s.count))
    });
    suggestions.truncate(limit);
    suggestions
}

fn collect(
    out: &mut Vec<AutocompleteSuggestion>,
    records: &[DrugRecord],
    set: &[String],
    q: &str,
    kind: SuggestionKind,
    cap: usize,
) {
    out.extend(
        set.iter()
            .filter(|value| value.contains(q))
            .take(cap)
            .map(|value| AutocompleteSuggestion {
                value: value.clone(),
                kind,
                count: supporting_rows(records, kind, value),
            }),
    );
}

/// Number of catalog rows backing a candidate value.
fn supporting_rows(records: &[DrugRecord], kind: SuggestionKind, value: &str) -> usize {
    records
        .iter()
        .filter(|record| match kind {
            SuggestionKind::DrugName => record.generic_name.eq_ignore_ascii_case(value),
            SuggestionKind::BrandName => record.brand_names.to_lowercase().contains(value),
            SuggestionKind::Condition => record
                .medical_condition
                .as_deref()
                .map(|c| c.to_lowercase().contains(value))
                .unwrap_or(false),
            SuggestionKind::DrugClass => record.drug_classes.to_lowercase().contains(value),
        })
        .count()
}
