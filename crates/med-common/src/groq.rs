/// Chat-completions client for the Groq provider (OpenAI-compatible API).
///
/// This is the secondary tier: it is only consulted after the primary
/// medical API has conclusively failed, and it is attempted at most once per
/// request. The credential is optional at startup; a client without one
/// reports `MissingCredential` deterministically when asked to generate.
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone, Debug)]
pub struct GroqClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub deadline: Duration,
    pub max_error_body_bytes: usize,
}

impl GroqClientConfig {
    /// Load configuration from the environment.
    ///
    /// - `GROQ_API_KEY` (optional; absence is not fatal to startup)
    /// - `GROQ_BASE_URL` (default `https://api.groq.com/openai/v1`)
    /// - `GROQ_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Self {
        let base_url = std::env::var("GROQ_BASE_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());

        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let deadline = std::env::var("GROQ_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            deadline,
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct GroqClient {
    config: GroqClientConfig,
    http: reqwest::Client,
}

impl GroqClient {
    pub fn new(config: GroqClientConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("med-assist/groq")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CommonError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CommonError::MissingCredential("GROQ_API_KEY"))?;

        let url = format!("{}/chat/completions", self.config.base_url);
        let fut = async {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(request)
                .send()
                .await?;
            self.parse_json_response(resp).await
        };
        match tokio::time::timeout(self.config.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(CommonError::DeadlineExceeded(self.config.deadline)),
        }
    }

    /// Single-shot generation: send the prompt, extract the first candidate's
    /// message content.
    pub async fn generate(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CommonError> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        };
        let response = self.chat_completions(&request).await?;
        first_choice_text(&response)
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, CommonError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(self.to_upstream_error(status, resp).await)
    }

    async fn to_upstream_error(
        &self,
        status: StatusCode,
        resp: reqwest::Response,
    ) -> CommonError {
        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<GroqErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return CommonError::Upstream { status, message };
        }
        CommonError::Upstream { status, message: body }
    }
}

/// Extract `choices[0].message.content`, trimmed.
pub fn first_choice_text(response: &ChatCompletionResponse) -> Result<String, CommonError> {
    response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(|s| s.trim().to_string())
        .ok_or(CommonError::MalformedResponse("choices[0].message.content"))
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

#[derive(Debug, Deserialize)]
struct GroqErrorEnvelope {
    error: GroqErrorObject,
}

#[derive(Debug, Deserialize)]
struct GroqErrorObject {
    message: Option<String>,
    #[allow(dead_code)]
    r#type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_content(content: Option<&str>) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: None,
            choices: vec![ChatCompletionChoice {
                index: Some(0),
                message: ChatCompletionMessage {
                    role: Some("assistant".to_string()),
                    content: content.map(|s| s.to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    #[test]
    fn first_choice_text_trims_content() {
        let response = response_with_content(Some("  An educational answer.\n"));
        assert_eq!(first_choice_text(&response).unwrap(), "An educational answer.");
    }

    #[test]
    fn first_choice_text_rejects_empty_choices() {
        let response = ChatCompletionResponse {
            id: None,
            choices: vec![],
        };
        assert!(matches!(
            first_choice_text(&response),
            Err(CommonError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_credential_is_deterministic() {
        let client = GroqClient::new(GroqClientConfig {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            deadline: Duration::from_secs(30),
            max_error_body_bytes: 8 * 1024,
        })
        .unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn upstream_error_envelope_parses() {
        let body = r#"{"error": {"message": "invalid api key", "type": "auth"}}"#;
        let parsed: GroqErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message.as_deref(), Some("invalid api key"));
    }
}
