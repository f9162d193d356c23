/// HTTP client for the primary medical API.
///
/// The primary service is an opaque network peer exposing `/qa`, `/recommend`,
/// `/search`, `/visualization` and `/health`. Every call races a fixed
/// deadline; when the deadline fires first the in-flight request future is
/// dropped, which aborts the underlying transfer. A non-success status is
/// reported as an upstream error with the body's `error` message when one is
/// present. The caller (the tier orchestrator) treats both outcomes as a
/// tier failure and advances, so no retry loop lives here.
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone, Debug)]
pub struct BackendClientConfig {
    pub base_url: String,
    pub deadline: Duration,
    pub health_deadline: Duration,
    pub max_error_body_bytes: usize,
}

impl BackendClientConfig {
    /// Load configuration from the environment.
    ///
    /// - `MEDICAL_API_BASE_URL` (default `http://localhost:5000`)
    /// - `MEDICAL_API_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Self {
        let base_url = std::env::var("MEDICAL_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let deadline = std::env::var("MEDICAL_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            deadline,
            health_deadline: Duration::from_secs(5),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    config: BackendClientConfig,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: BackendClientConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("med-assist/backend")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BackendClientConfig {
        &self.config
    }

    pub async fn qa(&self, request: &QaRequest) -> Result<QaResponse, CommonError> {
        self.post_json("/qa", request, self.config.deadline).await
    }

    pub async fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> Result<RecommendResponse, CommonError> {
        self.post_json("/recommend", request, self.config.deadline).await
    }

    pub async fn search(
        &self,
        request: &DrugSearchRequest,
    ) -> Result<DrugSearchResponse, CommonError> {
        self.post_json("/search", request, self.config.deadline).await
    }

    pub async fn visualization(
        &self,
        request: &VisualizationRequest,
    ) -> Result<serde_json::Value, CommonError> {
        self.post_json("/visualization", request, self.config.deadline)
            .await
    }

    /// Probe `GET /health` under the short health deadline.
    pub async fn health(&self) -> Result<HealthResponse, CommonError> {
        let url = format!("{}/health", self.config.base_url);
        let fut = async {
            let resp = self.http.get(&url).send().await?;
            self.parse_json_response(resp).await
        };
        match tokio::time::timeout(self.config.health_deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(CommonError::DeadlineExceeded(self.config.health_deadline)),
        }
    }

    /// POST a JSON body and parse the JSON response, racing `deadline`.
    ///
    /// `tokio::time::timeout` drops the request future when the timer wins,
    /// cancelling the in-flight connection rather than letting it run on.
    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        deadline: Duration,
    ) -> Result<T, CommonError>
    where
        B: Serialize,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.base_url, path);
        let fut = async {
            let resp = self.http.post(&url).json(body).send().await?;
            self.parse_json_response(resp).await
        };
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(CommonError::DeadlineExceeded(deadline)),
        }
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, CommonError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(to_upstream_error(resp, self.config.max_error_body_bytes).await)
    }
}

async fn to_upstream_error(resp: reqwest::Response, max_bytes: usize) -> CommonError {
    let status = resp.status();
    let body = read_limited_text(resp, max_bytes).await;
    if let Ok(parsed) = serde_json::from_str::<BackendErrorBody>(&body) {
        if let Some(message) = parsed.error.or(parsed.message) {
            return CommonError::Upstream { status, message };
        }
    }
    CommonError::Upstream {
        status,
        message: body,
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

/// Flask-style error bodies: `{"error": "..."}` or `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    error: Option<String>,
    message: Option<String>,
}

// --- Request bodies ---

#[derive(Debug, Clone, Serialize)]
pub struct QaRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendRequest {
    pub symptoms: Vec<String>,
    pub additional_info: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrugSearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drug_name: Option<String>,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualizationRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

// --- Response bodies ---
//
// Only the fields the envelope contract needs are declared; anything else
// the upstream schema grows is ignored during deserialization.

#[derive(Debug, Clone, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    pub context_preview: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendResponse {
    pub recommendations: String,
    #[serde(default)]
    pub semantic_matches: Vec<SemanticMatch>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SemanticMatch {
    pub drug_name: Option<String>,
    pub medical_condition: Option<String>,
    pub side_effects: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrugSearchResponse {
    #[serde(default)]
    pub results: Vec<SemanticMatch>,
    pub total_results: Option<usize>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_prefers_error_field() {
        let body: BackendErrorBody =
            serde_json::from_str(r#"{"error": "Question is required"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("Question is required"));
        assert!(body.message.is_none());
    }

    #[test]
    fn unknown_upstream_fields_are_ignored() {
        let json = r#"{
            "status": "success",
            "answer": "Aspirin thins the blood.",
            "context_preview": "ctx",
            "method": "DPR + FAISS + GROQ",
            "retrieval_scores": [0.9, 0.8]
        }"#;
        let resp: QaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.answer, "Aspirin thins the blood.");
        assert_eq!(resp.method.as_deref(), Some("DPR + FAISS + GROQ"));
    }

    #[test]
    fn search_results_default_to_empty() {
        let resp: DrugSearchResponse =
            serde_json::from_str(r#"{"total_results": 0}"#).unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn visualization_request_serializes_type_discriminator() {
        let req = VisualizationRequest {
            kind: "ner_entities".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "ner_entities");
    }
}
