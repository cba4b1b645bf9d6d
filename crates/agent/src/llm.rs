use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use selma_core::config::LlmConfig;
use selma_core::{ChatMessage, MessageRole};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion request timed out")]
    Timeout,
    #[error("completion provider rejected the request (status {status}): {message}")]
    Provider { status: u16, message: String },
    #[error("completion response was malformed: {0}")]
    MalformedResponse(String),
}

/// One request, one generated text. Failures are terminal for the current
/// pipeline run; retry policy belongs to the caller's caller, not here.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CompletionError::Request(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// The store keeps the relay's own role tags; providers only accept the
// OpenAI names, so `ai` becomes `assistant` at the wire boundary.
fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Ai => "assistant",
        MessageRole::System => "system",
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn first_candidate_text(payload: CompletionResponse) -> Result<String, CompletionError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            CompletionError::MalformedResponse(
                "response carried no generated candidate".to_string(),
            )
        })
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: wire_role(message.role),
                    content: &message.content,
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Request(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider { status: status.as_u16(), message });
        }

        let payload = response
            .json::<CompletionResponse>()
            .await
            .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;

        first_candidate_text(payload)
    }
}

#[cfg(test)]
mod tests {
    use selma_core::MessageRole;

    use super::{first_candidate_text, wire_role, CompletionError, CompletionResponse};

    fn parse(raw: &str) -> CompletionResponse {
        serde_json::from_str(raw).expect("test payload should deserialize")
    }

    #[test]
    fn stored_ai_role_maps_to_wire_assistant() {
        assert_eq!(wire_role(MessageRole::User), "user");
        assert_eq!(wire_role(MessageRole::Ai), "assistant");
        assert_eq!(wire_role(MessageRole::System), "system");
    }

    #[test]
    fn first_candidate_is_extracted() {
        let payload = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"Happy to help."}},
                          {"message":{"role":"assistant","content":"Second candidate."}}]}"#,
        );
        let text = first_candidate_text(payload).expect("candidate present");
        assert_eq!(text, "Happy to help.");
    }

    #[test]
    fn empty_choice_list_is_malformed() {
        let payload = parse(r#"{"choices":[]}"#);
        assert!(matches!(
            first_candidate_text(payload),
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn null_content_is_malformed() {
        let payload = parse(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#);
        assert!(matches!(
            first_candidate_text(payload),
            Err(CompletionError::MalformedResponse(_))
        ));
    }
}
