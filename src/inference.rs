use crate::config::Config;
use crate::retry::{RetryPolicy, Retryable};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Errors from a single remote invocation
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The service rejected the call for rate limiting
    #[error("throttled: {message}")]
    Throttled { message: String },

    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Retryable for InferenceError {
    fn is_retryable(&self) -> bool {
        matches!(self, InferenceError::Throttled { .. })
    }
}

/// Provider family, decided by the model identifier prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    OpenAi,
    Mistral,
}

impl ProviderFamily {
    pub fn of(model_id: &str) -> Self {
        if model_id.starts_with("mistral.") {
            ProviderFamily::Mistral
        } else {
            ProviderFamily::OpenAi
        }
    }

    /// Request body for this family
    pub fn request_body(self, prompt: String, temperature: f64, max_tokens: u32) -> InvokeRequest {
        match self {
            // both families currently accept the chat-message schema
            ProviderFamily::OpenAi | ProviderFamily::Mistral => InvokeRequest {
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                max_tokens,
                temperature,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// JSON body sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

/// Response shapes returned by the supported providers, keyed by the first
/// top-level field present out of `choices`, `content` and `outputs`
#[derive(Debug)]
pub enum ProviderResponse {
    /// `{"choices": [{"message": {"content": ...}}]}`
    Chat(Vec<ChatChoice>),
    /// `{"content": [{"text": ...}]}`
    ContentBlocks(Vec<TextBlock>),
    /// `{"outputs": [{"text": ...}]}`
    Outputs(Vec<TextBlock>),
    /// A known key whose value has the wrong structure
    Malformed { key: &'static str, error: String },
    Unrecognized(Value),
}

impl ProviderResponse {
    pub fn from_value(body: Value) -> Self {
        let mut object = match body {
            Value::Object(object) => object,
            other => return ProviderResponse::Unrecognized(other),
        };

        if let Some(choices) = object.remove("choices") {
            return Self::parse("choices", choices, ProviderResponse::Chat);
        }
        if let Some(content) = object.remove("content") {
            return Self::parse("content", content, ProviderResponse::ContentBlocks);
        }
        if let Some(outputs) = object.remove("outputs") {
            return Self::parse("outputs", outputs, ProviderResponse::Outputs);
        }

        ProviderResponse::Unrecognized(Value::Object(object))
    }

    fn parse<T: serde::de::DeserializeOwned>(
        key: &'static str,
        value: Value,
        variant: fn(T) -> Self,
    ) -> Self {
        match serde_json::from_value(value) {
            Ok(parsed) => variant(parsed),
            Err(e) => ProviderResponse::Malformed {
                key,
                error: e.to_string(),
            },
        }
    }

    /// Generated text. An unrecognized shape yields the raw serialized body.
    pub fn into_text(self) -> Option<String> {
        match self {
            ProviderResponse::Chat(choices) => {
                choices.into_iter().next().and_then(|c| c.message.content)
            }
            ProviderResponse::ContentBlocks(blocks) | ProviderResponse::Outputs(blocks) => {
                blocks.into_iter().next().map(|b| b.text)
            }
            ProviderResponse::Malformed { key, error } => {
                warn!(key, %error, "response field has an unexpected structure");
                None
            }
            ProviderResponse::Unrecognized(body) => {
                let keys: Vec<&str> = match body.as_object() {
                    Some(object) => object.keys().map(String::as_str).collect(),
                    None => Vec::new(),
                };
                warn!(?keys, "unexpected response format, keeping raw body");
                Some(body.to_string())
            }
        }
    }
}

/// A remote service that runs one model invocation
#[allow(async_fn_in_trait)]
pub trait InferenceBackend {
    async fn invoke(&self, model_id: &str, body: &InvokeRequest) -> Result<Value, InferenceError>;
}

/// Bedrock runtime `InvokeModel` over HTTPS with an API key
pub struct BedrockClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl BedrockClient {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create the client, reading the API key from the configured variable
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("Environment variable {} not found", config.api_key_env))?;
        Ok(Self::new(&config.endpoint(), &api_key))
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.endpoint, model_id)
    }
}

impl std::fmt::Debug for BedrockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl InferenceBackend for BedrockClient {
    async fn invoke(&self, model_id: &str, body: &InvokeRequest) -> Result<Value, InferenceError> {
        let response = self
            .http
            .post(self.invoke_url(model_id))
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let throttled = status == StatusCode::TOO_MANY_REQUESTS
            || error_type
                .as_deref()
                .is_some_and(|t| t.starts_with("ThrottlingException"))
            || text.contains("ThrottlingException");

        if throttled {
            Err(InferenceError::Throttled { message: text })
        } else {
            Err(InferenceError::Service {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

/// Turns dialogues into clinical notes through a backend
pub struct NoteGenerator<B> {
    backend: B,
    system_prompt: String,
    temperature: f64,
    max_tokens: u32,
    retry: RetryPolicy,
    request_delay: Duration,
}

impl<B: InferenceBackend> NoteGenerator<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: config.retry_policy(),
            request_delay: config.request_delay(),
        }
    }

    pub fn build_prompt(&self, dialogue: &str) -> String {
        format!(
            "{}\n\nDoctor-Patient Conversation:\n{}\n\nClinical Note:",
            self.system_prompt, dialogue
        )
    }

    pub fn build_request(&self, model_id: &str, dialogue: &str) -> InvokeRequest {
        ProviderFamily::of(model_id).request_body(
            self.build_prompt(dialogue),
            self.temperature,
            self.max_tokens,
        )
    }

    /// Generate a note; `None` when the call failed or returned no text.
    /// Always waits the request delay afterwards.
    pub async fn generate_note(&self, model_id: &str, dialogue: &str) -> Option<String> {
        let request = self.build_request(model_id, dialogue);

        let outcome = self
            .retry
            .run(|attempt| {
                debug!(model_id, attempt = attempt + 1, "invoking model");
                self.backend.invoke(model_id, &request)
            })
            .await;

        let note = match outcome {
            Ok(body) => ProviderResponse::from_value(body)
                .into_text()
                .filter(|text| !text.is_empty()),
            Err(e @ InferenceError::Throttled { .. }) => {
                warn!(model_id, error = %e, "max retries exceeded for throttling");
                None
            }
            Err(e) => {
                error!(model_id, error = %e, "model invocation failed");
                None
            }
        };

        sleep(self.request_delay).await;
        note
    }
}

#[cfg(test)]
impl<B> NoteGenerator<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
