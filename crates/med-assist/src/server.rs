/// MCP server implementation for the medical information assistant.
///
/// Exposes eight tools:
/// - `ask_question`: tiered medical Q&A
/// - `recommend_medicines`: tiered symptom-based recommendations
/// - `search_drugs`: tiered remote drug search
/// - `search_catalog`: on-device catalog search (no network)
/// - `suggest_completions`: autocomplete over the catalog index
/// - `get_visualization`: typed plot data, single kind or full bundle
/// - `service_status`: backend reachability and catalog provenance
/// - `refresh_catalog`: refetch the catalog, swap only when content changed
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use med_common::backend::BackendClient;
use med_common::groq::GroqClient;

use crate::autocomplete;
use crate::catalog::{CatalogLoader, CatalogState, LoadedCatalog};
use crate::model::{
    source, AutocompleteSuggestion, CatalogSearchPayload, QaPayload, RecommendationPayload,
    RemoteSearchPayload, RetrievalEnvelope, SearchFilters, ServiceStatusPayload, SuggestMode,
};
use crate::orchestrator::Orchestrator;
use crate::search;
use crate::viz::VisualizationPayload;

// --- Tool parameter and response shapes ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AskQuestionParams {
    /// Medical question in plain language.
    pub question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecommendMedicinesParams {
    /// Symptoms to address, e.g. ["headache", "fever"].
    pub symptoms: Vec<String>,
    /// Free-text context such as age or existing conditions.
    pub additional_info: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchDrugsParams {
    pub query: String,
    /// Restrict results to a specific drug.
    pub drug_name: Option<String>,
    /// Maximum number of results (default 10).
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchCatalogParams {
    /// Free-text query matched against names, brands, classes, conditions
    /// and side effects. Exactly one of `query` and `condition` is required.
    pub query: Option<String>,
    /// Condition-scoped search, e.g. "diabetes". Filters do not apply.
    pub condition: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestCompletionsParams {
    /// Partial input, at least 2 characters.
    pub query: String,
    /// `drug` (default) or `condition`.
    pub mode: Option<SuggestMode>,
    /// Maximum number of suggestions (default 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetVisualizationParams {
    /// One of `ner_entities`, `knowledge_graph`, `embedding_points`,
    /// `similarity_ranking`. Omit to fetch the full bundle.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SuggestionsResponse {
    pub query: String,
    pub suggestions: Vec<AutocompleteSuggestion>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct VisualizationResponse {
    pub visualizations: Vec<RetrievalEnvelope<VisualizationPayload>>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RefreshCatalogResponse {
    /// False when the refetched content matched the current fingerprint.
    pub updated: bool,
    pub records: usize,
    pub source: String,
    pub fingerprint: String,
}

// --- MCP Server ---

#[derive(Clone)]
pub struct MedAssistServer {
    catalog: Arc<RwLock<CatalogState>>,
    loader: Arc<CatalogLoader>,
    orchestrator: Arc<Orchestrator>,
    backend: Arc<BackendClient>,
    groq: Arc<GroqClient>,
    tool_router: ToolRouter<MedAssistServer>,
}

impl MedAssistServer {
    pub fn new(
        loaded: LoadedCatalog,
        loader: CatalogLoader,
        backend: Arc<BackendClient>,
        groq: Arc<GroqClient>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&backend), Arc::clone(&groq)));
        Self {
            catalog: Arc::new(RwLock::new(CatalogState::from_loaded(loaded))),
            loader: Arc::new(loader),
            orchestrator,
            backend,
            groq,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl MedAssistServer {
    #[tool(description = "Answer a medical question for educational purposes. Falls back through a secondary provider to static guidance when the primary service is unavailable.")]
    async fn ask_question(
        &self,
        Parameters(params): Parameters<AskQuestionParams>,
    ) -> Result<Json<RetrievalEnvelope<QaPayload>>, String> {
        self.orchestrator
            .ask_question(&params.question)
            .await
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Suggest over-the-counter medicines for a list of symptoms, with side effects to watch for. Educational information, not medical advice.")]
    async fn recommend_medicines(
        &self,
        Parameters(params): Parameters<RecommendMedicinesParams>,
    ) -> Result<Json<RetrievalEnvelope<RecommendationPayload>>, String> {
        self.orchestrator
            .recommend(params.symptoms, params.additional_info.unwrap_or_default())
            .await
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Search the remote drug knowledge base by free text, optionally scoped to one drug.")]
    async fn search_drugs(
        &self,
        Parameters(params): Parameters<SearchDrugsParams>,
    ) -> Result<Json<RetrievalEnvelope<RemoteSearchPayload>>, String> {
        self.orchestrator
            .search_remote(&params.query, params.drug_name, params.top_k)
            .await
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Search the local drug catalog without any network call. Supports free-text search with structured filters (rx_otc, pregnancy_category, min_rating, drug_class) or condition-scoped search.")]
    async fn search_catalog(
        &self,
        Parameters(params): Parameters<SearchCatalogParams>,
    ) -> Result<Json<RetrievalEnvelope<CatalogSearchPayload>>, String> {
        let catalog = self.catalog.read().await;
        let (query, results) = match (&params.query, &params.condition) {
            (Some(query), None) => (
                query.clone(),
                search::search(&catalog.records, query, &params.filters, params.limit),
            ),
            (None, Some(condition)) => {
                if !params.filters.is_empty() {
                    return Err("filters do not apply to condition search".to_string());
                }
                (
                    condition.clone(),
                    search::search_by_condition(&catalog.records, condition, params.limit),
                )
            }
            _ => return Err("provide exactly one of query or condition".to_string()),
        };

        let payload = CatalogSearchPayload {
            query,
            total_results: results.len(),
            results,
        };
        Ok(Json(RetrievalEnvelope::success(source::LOCAL_CATALOG, payload)))
    }

    #[tool(description = "Autocomplete partial input against the drug catalog. Mode 'drug' draws from names, brands and classes; mode 'condition' from medical conditions.")]
    async fn suggest_completions(
        &self,
        Parameters(params): Parameters<SuggestCompletionsParams>,
    ) -> Result<Json<SuggestionsResponse>, String> {
        let catalog = self.catalog.read().await;
        let suggestions = autocomplete::suggest(
            &catalog.index,
            &catalog.records,
            &params.query,
            params.mode.unwrap_or(SuggestMode::Drug),
            params.limit,
        );
        Ok(Json(SuggestionsResponse {
            query: params.query,
            suggestions,
        }))
    }

    #[tool(description = "Fetch typed visualization data: named-entity counts, drug knowledge graph, 2-D embedding points or similarity rankings. Omit 'type' to fetch all four concurrently.")]
    async fn get_visualization(
        &self,
        Parameters(params): Parameters<GetVisualizationParams>,
    ) -> Result<Json<VisualizationResponse>, String> {
        let visualizations = match params.kind {
            Some(kind) => vec![self
                .orchestrator
                .visualization(&kind)
                .await
                .map_err(|e| e.to_string())?],
            None => self.orchestrator.visualization_bundle().await,
        };
        Ok(Json(VisualizationResponse { visualizations }))
    }

    #[tool(description = "Report backend reachability, secondary-provider configuration and catalog provenance.")]
    async fn service_status(&self) -> Result<Json<ServiceStatusPayload>, String> {
        let (backend, backend_detail) = match self.backend.health().await {
            Ok(health) => ("connected".to_string(), Some(health.status)),
            Err(e) => ("unreachable".to_string(), Some(e.to_string())),
        };

        let catalog = self.catalog.read().await;
        Ok(Json(ServiceStatusPayload {
            backend,
            backend_detail,
            groq_configured: self.groq.is_configured(),
            catalog_records: catalog.records.len(),
            catalog_source: catalog.source.label().to_string(),
            catalog_fingerprint: catalog.fingerprint.clone(),
        }))
    }

    #[tool(description = "Refetch the drug catalog from its configured source and rebuild the search index if the content changed.")]
    async fn refresh_catalog(&self) -> Result<Json<RefreshCatalogResponse>, String> {
        info!("refresh_catalog tool invoked");

        let loaded = self.loader.load().await;

        {
            let catalog = self.catalog.read().await;
            if catalog.fingerprint == loaded.fingerprint {
                info!(fingerprint = %catalog.fingerprint, "catalog unchanged, keeping current index");
                return Ok(Json(RefreshCatalogResponse {
                    updated: false,
                    records: catalog.records.len(),
                    source: catalog.source.label().to_string(),
                    fingerprint: catalog.fingerprint.clone(),
                }));
            }
        }

        let next = CatalogState::from_loaded(loaded);
        let response = RefreshCatalogResponse {
            updated: true,
            records: next.records.len(),
            source: next.source.label().to_string(),
            fingerprint: next.fingerprint.clone(),
        };

        let mut catalog = self.catalog.write().await;
        *catalog = next;
        info!(
            records = response.records,
            source = %response.source,
            "catalog swapped"
        );
        Ok(Json(response))
    }
}

#[tool_handler]
impl ServerHandler for MedAssistServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "med-assist".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Medical information MCP server, for educational use only. \
                 Use ask_question for medical Q&A, recommend_medicines for \
                 symptom-based suggestions, search_drugs for remote knowledge-base \
                 search, search_catalog and suggest_completions for the local \
                 drug catalog, get_visualization for plot data, service_status \
                 for diagnostics and refresh_catalog to reload the dataset. \
                 Remote answers degrade gracefully to static content when \
                 upstream services are unavailable; check the envelope's \
                 'degraded' flag."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;
    use crate::config::Config;
    use med_common::backend::BackendClientConfig;
    use med_common::groq::GroqClientConfig;
    use std::time::Duration;

    fn test_server() -> MedAssistServer {
        let backend = BackendClient::new(BackendClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            deadline: Duration::from_millis(250),
            health_deadline: Duration::from_millis(250),
            max_error_body_bytes: 1024,
        })
        .unwrap();
        let groq = GroqClient::new(GroqClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            deadline: Duration::from_millis(250),
            max_error_body_bytes: 1024,
        })
        .unwrap();
        let loader = CatalogLoader::new(Config {
            catalog_url: None,
            catalog_path: None,
        })
        .unwrap();
        MedAssistServer::new(builtin_catalog(), loader, Arc::new(backend), Arc::new(groq))
    }

    #[test]
    fn tools_publish_output_schemas() {
        let tools = MedAssistServer::tool_router().list_all();
        for name in [
            "ask_question",
            "recommend_medicines",
            "search_drugs",
            "search_catalog",
            "suggest_completions",
            "get_visualization",
            "service_status",
            "refresh_catalog",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn search_catalog_requires_exactly_one_scope() {
        let server = test_server();
        let both = server
            .search_catalog(Parameters(SearchCatalogParams {
                query: Some("pain".to_string()),
                condition: Some("pain".to_string()),
                filters: SearchFilters::default(),
                limit: None,
            }))
            .await;
        assert!(both.is_err());

        let neither = server
            .search_catalog(Parameters(SearchCatalogParams {
                query: None,
                condition: None,
                filters: SearchFilters::default(),
                limit: None,
            }))
            .await;
        assert!(neither.is_err());
    }

    #[tokio::test]
    async fn search_catalog_is_labeled_local_and_never_degraded() {
        let server = test_server();
        let Json(envelope) = server
            .search_catalog(Parameters(SearchCatalogParams {
                query: Some("aspirin".to_string()),
                condition: None,
                filters: SearchFilters::default(),
                limit: None,
            }))
            .await
            .unwrap();
        assert_eq!(envelope.source, source::LOCAL_CATALOG);
        assert!(!envelope.degraded);
        assert_eq!(envelope.payload.total_results, envelope.payload.results.len());
        assert!(!envelope.payload.results.is_empty());
    }

    #[tokio::test]
    async fn condition_search_rejects_filters() {
        let server = test_server();
        let result = server
            .search_catalog(Parameters(SearchCatalogParams {
                query: None,
                condition: Some("pain".to_string()),
                filters: SearchFilters {
                    rx_otc: Some("OTC".to_string()),
                    ..Default::default()
                },
                limit: None,
            }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn suggest_completions_uses_drug_mode_by_default() {
        let server = test_server();
        let Json(response) = server
            .suggest_completions(Parameters(SuggestCompletionsParams {
                query: "asp".to_string(),
                mode: None,
                limit: None,
            }))
            .await
            .unwrap();
        assert!(response
            .suggestions
            .iter()
            .any(|s| s.value == "aspirin"));
    }

    #[tokio::test]
    async fn refresh_with_unchanged_content_keeps_fingerprint() {
        // Loader has no configured source, so it resolves the built-in
        // catalog again and the fingerprints match.
        let server = test_server();
        let Json(response) = server.refresh_catalog().await.unwrap();
        assert!(!response.updated);
        assert_eq!(response.fingerprint, "builtin");
    }

    #[tokio::test]
    async fn service_status_reports_catalog_provenance() {
        let server = test_server();
        let Json(status) = server.service_status().await.unwrap();
        assert_eq!(status.backend, "unreachable");
        assert!(!status.groq_configured);
        assert_eq!(status.catalog_source, "builtin");
        assert!(status.catalog_records >= 2);
    }
}
