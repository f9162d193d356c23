/// Tiered retrieval orchestrator.
///
/// Every remote capability resolves through the same three-tier cascade:
/// the primary medical API under a bounded deadline, then the Groq provider
/// (at most once, and only when a credential is configured), then a
/// statically synthesized payload. Tiers run strictly sequentially; nothing
/// loops back, and no tier error escapes this module — the worst outcome is
/// a clearly labeled degraded envelope.
///
/// Input validation happens before any tier: a missing question, an empty
/// symptom list or a blank query is rejected without a network call.
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use med_common::backend::{
    BackendClient, DrugSearchRequest, QaRequest, RecommendRequest, VisualizationRequest,
};
use med_common::error::CommonError;
use med_common::groq::GroqClient;

use crate::error::AppError;
use crate::fallback;
use crate::model::{
    source, QaPayload, RecommendationPayload, RemoteSearchPayload, RetrievalEnvelope,
};
use crate::viz::{self, VisualizationPayload, VizKind};

pub const DEFAULT_REMOTE_SEARCH_LIMIT: usize = 10;

// Fixed decoding parameters per capability, matching the reference service.
const QA_MODEL: &str = "llama-3.1-8b-instant";
const QA_TEMPERATURE: f32 = 0.3;
const QA_MAX_TOKENS: u32 = 300;
const RECOMMEND_MODEL: &str = "gemma2-9b-it";
const RECOMMEND_TEMPERATURE: f32 = 0.2;
const RECOMMEND_MAX_TOKENS: u32 = 300;
const SEARCH_MODEL: &str = "llama-3.1-8b-instant";
const SEARCH_TEMPERATURE: f32 = 0.2;
const SEARCH_MAX_TOKENS: u32 = 300;

const SYSTEM_PROMPT: &str =
    "You are a helpful medical assistant providing educational information.";

pub struct Orchestrator {
    backend: Arc<BackendClient>,
    groq: Arc<GroqClient>,
}

impl Orchestrator {
    pub fn new(backend: Arc<BackendClient>, groq: Arc<GroqClient>) -> Self {
        Self { backend, groq }
    }

    pub async fn ask_question(
        &self,
        question: &str,
    ) -> Result<RetrievalEnvelope<QaPayload>, AppError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question is required".to_string()));
        }

        let tier1 = {
            let question = question.clone();
            async move {
                let resp = self.backend.qa(&QaRequest { question: question.clone() }).await?;
                Ok(QaPayload {
                    question,
                    answer: resp.answer,
                    context_preview: resp.context_preview,
                    method: resp.method.unwrap_or_else(|| "medical-api".to_string()),
                })
            }
        };

        let tier2 = self.groq_tier(|groq| {
            let question = question.clone();
            async move {
                let prompt = qa_prompt(&question);
                let answer = groq
                    .generate(QA_MODEL, SYSTEM_PROMPT, &prompt, QA_TEMPERATURE, QA_MAX_TOKENS)
                    .await?;
                Ok(QaPayload {
                    question,
                    answer,
                    context_preview: None,
                    method: "groq-fallback".to_string(),
                })
            }
        });

        Ok(run_tiers("qa", tier1, tier2, || fallback::qa(&question)).await)
    }

    pub async fn recommend(
        &self,
        symptoms: Vec<String>,
        additional_info: String,
    ) -> Result<RetrievalEnvelope<RecommendationPayload>, AppError> {
        let symptoms: Vec<String> = symptoms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symptoms.is_empty() {
            return Err(AppError::InvalidInput("symptoms are required".to_string()));
        }
        let additional_info = additional_info.trim().to_string();

        let tier1 = {
            let symptoms = symptoms.clone();
            let additional_info = additional_info.clone();
            async move {
                let resp = self
                    .backend
                    .recommend(&RecommendRequest {
                        symptoms: symptoms.clone(),
                        additional_info: additional_info.clone(),
                    })
                    .await?;
                Ok(RecommendationPayload {
                    symptoms,
                    additional_info,
                    recommendations: resp.recommendations,
                    matches: resp.semantic_matches,
                    method: resp.method.unwrap_or_else(|| "medical-api".to_string()),
                })
            }
        };

        let tier2 = self.groq_tier(|groq| {
            let symptoms = symptoms.clone();
            let additional_info = additional_info.clone();
            async move {
                let prompt = recommend_prompt(&symptoms, &additional_info);
                let recommendations = groq
                    .generate(
                        RECOMMEND_MODEL,
                        SYSTEM_PROMPT,
                        &prompt,
                        RECOMMEND_TEMPERATURE,
                        RECOMMEND_MAX_TOKENS,
                    )
                    .await?;
                Ok(RecommendationPayload {
                    symptoms,
                    additional_info,
                    recommendations,
                    matches: Vec::new(),
                    method: "groq-fallback".to_string(),
                })
            }
        });

        Ok(run_tiers("recommend", tier1, tier2, || {
            fallback::recommendation(&symptoms, &additional_info)
        })
        .await)
    }

    pub async fn search_remote(
        &self,
        query: &str,
        drug_name: Option<String>,
        top_k: Option<usize>,
    ) -> Result<RetrievalEnvelope<RemoteSearchPayload>, AppError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query is required".to_string()));
        }
        let top_k = top_k.unwrap_or(DEFAULT_REMOTE_SEARCH_LIMIT);

        let tier1 = {
            let query = query.clone();
            async move {
                let resp = self
                    .backend
                    .search(&DrugSearchRequest {
                        query: query.clone(),
                        drug_name,
                        top_k,
                    })
                    .await?;
                let total_results = resp.total_results.unwrap_or(resp.results.len());
                Ok(RemoteSearchPayload {
                    query,
                    results: resp.results,
                    total_results,
                    summary: None,
                    method: resp.method.unwrap_or_else(|| "medical-api".to_string()),
                })
            }
        };

        let tier2 = self.groq_tier(|groq| {
            let query = query.clone();
            async move {
                let prompt = search_prompt(&query);
                let summary = groq
                    .generate(
                        SEARCH_MODEL,
                        SYSTEM_PROMPT,
                        &prompt,
                        SEARCH_TEMPERATURE,
                        SEARCH_MAX_TOKENS,
                    )
                    .await?;
                Ok(RemoteSearchPayload {
                    query,
                    results: Vec::new(),
                    total_results: 0,
                    summary: Some(summary),
                    method: "groq-fallback".to_string(),
                })
            }
        });

        Ok(run_tiers("search", tier1, tier2, || fallback::search(&query)).await)
    }

    /// Resolve a visualization request. Unknown kinds are rejected before any
    /// tier; there is no generative tier for structured plot data, so a
    /// Tier-1 failure degrades straight to the synthesized sample.
    pub async fn visualization(
        &self,
        kind: &str,
    ) -> Result<RetrievalEnvelope<VisualizationPayload>, AppError> {
        let kind = VizKind::parse(kind)?;
        Ok(self.visualization_known(kind).await)
    }

    /// Fetch all visualization kinds concurrently.
    pub async fn visualization_bundle(&self) -> Vec<RetrievalEnvelope<VisualizationPayload>> {
        futures::future::join_all(
            VizKind::ALL
                .iter()
                .map(|kind| self.visualization_known(*kind)),
        )
        .await
    }

    async fn visualization_known(
        &self,
        kind: VizKind,
    ) -> RetrievalEnvelope<VisualizationPayload> {
        let tier1 = async move {
            let value = self
                .backend
                .visualization(&VisualizationRequest {
                    kind: kind.as_str().to_string(),
                })
                .await?;
            viz::map_response(kind, value)
        };

        match tier1.await {
            Ok(payload) => {
                info!(capability = "visualization", kind = kind.as_str(), "tier 1 answered");
                RetrievalEnvelope::success(source::MEDICAL_API, payload)
            }
            Err(e) => {
                warn!(
                    capability = "visualization",
                    kind = kind.as_str(),
                    error = %e,
                    "tier 1 failed, synthesizing sample"
                );
                RetrievalEnvelope::degraded_fallback(viz::fallback_payload(kind))
            }
        }
    }

    /// Build the Tier-2 future, or `None` when no credential is configured —
    /// the tier then fails deterministically without a request.
    fn groq_tier<T, F, Fut>(&self, build: F) -> Option<Fut>
    where
        F: FnOnce(Arc<GroqClient>) -> Fut,
        Fut: Future<Output = Result<T, CommonError>>,
    {
        if self.groq.is_configured() {
            Some(build(Arc::clone(&self.groq)))
        } else {
            None
        }
    }
}

/// The cascade itself, shared by every remote capability.
///
/// State machine per request:
/// `START -> TIER1_PENDING -> {SUCCESS | TIER2_PENDING} ->
/// {SUCCESS | TIER3_FALLBACK} -> DONE`. Each tier is awaited at most once,
/// and Tier 3 cannot fail.
pub(crate) async fn run_tiers<T, F1, F2>(
    capability: &'static str,
    tier1: F1,
    tier2: Option<F2>,
    fallback: impl FnOnce() -> T,
) -> RetrievalEnvelope<T>
where
    F1: Future<Output = Result<T, CommonError>>,
    F2: Future<Output = Result<T, CommonError>>,
{
    match tier1.await {
        Ok(payload) => {
            info!(capability, source = source::MEDICAL_API, "tier 1 answered");
            return RetrievalEnvelope::success(source::MEDICAL_API, payload);
        }
        Err(e) if e.is_tier_failure() => {
            warn!(capability, error = %e, "tier 1 failed, advancing to tier 2");
        }
        Err(e) => {
            // Contract drift rather than an expected outage; still recover,
            // but loudly.
            tracing::error!(capability, error = %e, "tier 1 returned an unusable response");
        }
    }

    match tier2 {
        Some(tier2) => match tier2.await {
            Ok(payload) => {
                info!(capability, source = source::GROQ, "tier 2 answered");
                return RetrievalEnvelope::success(source::GROQ, payload);
            }
            Err(e) => {
                warn!(capability, error = %e, "tier 2 failed, falling back");
            }
        },
        None => {
            warn!(
                capability,
                "secondary provider credential not configured, skipping tier 2"
            );
        }
    }

    info!(capability, source = source::STATIC_FALLBACK, "synthesizing fallback payload");
    RetrievalEnvelope::degraded_fallback(fallback())
}

fn qa_prompt(question: &str) -> String {
    format!(
        "You are a knowledgeable medical assistant designed for educational and \
informational purposes only. Provide a brief, logical, and educational \
explanation using your medical understanding, framed as educational content.\n\n\
Question: {question}\n\nAnswer (for educational purposes only):"
    )
}

fn recommend_prompt(symptoms: &[String], additional_info: &str) -> String {
    let mut prompt = format!(
        "Which over-the-counter medicines are likely appropriate and what side \
effects should this patient watch for? Answer with factual, educational \
information.\n\nPatient Information:\nSymptoms: {}",
        symptoms.join(", ")
    );
    if !additional_info.is_empty() {
        prompt.push_str(&format!("\nAdditional Information: {additional_info}"));
    }
    prompt.push_str("\n\nAnswer:");
    prompt
}

fn search_prompt(query: &str) -> String {
    format!(
        "Provide brief educational information about medicines matching the \
following search: {query}\n\nAnswer (educational information only):"
    )
}
