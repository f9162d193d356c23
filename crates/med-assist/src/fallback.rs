/// Tier-3 payload synthesis.
///
/// These builders never touch the network and never fail; the orchestrator
/// calls them only after both remote tiers have been exhausted. Content is
/// drawn from the built-in catalog so a degraded reply still carries real
/// drug information instead of an apology.
use med_common::backend::SemanticMatch;

use crate::catalog::builtin_records;
use crate::model::{QaPayload, RecommendationPayload, RemoteSearchPayload};

const METHOD: &str = "static-fallback";

const GENERAL_GUIDANCE: &str = "The medical information service is currently \
unavailable. For questions about medications, consult the drug's package \
insert or a pharmacist. Common over-the-counter options for pain and fever \
include acetaminophen (Tylenol) and ibuprofen (Advil); both have dosing \
limits and interactions that a pharmacist can explain. This is educational \
information, not medical advice.";

pub fn qa(question: &str) -> QaPayload {
    QaPayload {
        question: question.to_string(),
        answer: GENERAL_GUIDANCE.to_string(),
        context_preview: None,
        method: METHOD.to_string(),
    }
}

pub fn recommendation(symptoms: &[String], additional_info: &str) -> RecommendationPayload {
    let recommendations = format!(
        "Live recommendations are unavailable right now. For symptoms such as \
{}, commonly used over-the-counter medicines include acetaminophen for pain \
and fever, ibuprofen for pain with inflammation, and aspirin for pain in \
adults. Check labels for interactions and talk to a pharmacist before \
combining medicines. This is educational information, not medical advice.",
        symptoms.join(", ")
    );
    RecommendationPayload {
        symptoms: symptoms.to_vec(),
        additional_info: additional_info.to_string(),
        recommendations,
        matches: representative_matches(),
        method: METHOD.to_string(),
    }
}

pub fn search(query: &str) -> RemoteSearchPayload {
    let results = representative_matches();
    RemoteSearchPayload {
        query: query.to_string(),
        total_results: results.len(),
        results,
        summary: Some(
            "Search is running in offline mode; showing a representative \
sample from the local drug catalog instead of live results."
                .to_string(),
        ),
        method: METHOD.to_string(),
    }
}

/// A few representative entries from the built-in catalog, in the same shape
/// Tier-1 search results use.
fn representative_matches() -> Vec<SemanticMatch> {
    builtin_records()
        .into_iter()
        .take(3)
        .map(|record| SemanticMatch {
            drug_name: Some(record.generic_name),
            medical_condition: record.medical_condition,
            side_effects: record.side_effects,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_fallback_echoes_question() {
        let payload = qa("Is aspirin a blood thinner?");
        assert_eq!(payload.question, "Is aspirin a blood thinner?");
        assert!(!payload.answer.is_empty());
        assert_eq!(payload.method, "static-fallback");
    }

    #[test]
    fn recommendation_fallback_mentions_symptoms_and_carries_matches() {
        let symptoms = vec!["headache".to_string(), "fever".to_string()];
        let payload = recommendation(&symptoms, "adult");
        assert!(payload.recommendations.contains("headache, fever"));
        assert_eq!(payload.matches.len(), 3);
        assert!(payload
            .matches
            .iter()
            .all(|m| m.drug_name.as_deref().is_some_and(|n| !n.is_empty())));
    }

    #[test]
    fn search_fallback_reports_consistent_totals() {
        let payload = search("blood thinner");
        assert_eq!(payload.total_results, payload.results.len());
        assert!(payload.summary.is_some());
    }
}
