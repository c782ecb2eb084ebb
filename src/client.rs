//! Generation client: calls the Google Generative Language endpoint with a
//! per-attempt timeout and bounded exponential-backoff retry.
//!
//! The HTTP transport sits behind [`GenerationBackend`] so the retry loop and
//! everything above it can be exercised against an in-process fake.

use crate::config::{GenerationConfig, GENAI_ENDPOINT};
use crate::error::PlanError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One attempt against the generation endpoint.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send the prompt and return the model's raw text output.
    async fn generate(&self, prompt: &str) -> Result<String, PlanError>;
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationOptions,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationOptions {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

fn map_transport_error(error: reqwest::Error) -> PlanError {
    if error.is_timeout() {
        PlanError::Transport(format!("request timeout: {}", error))
    } else if error.is_connect() {
        PlanError::Transport(format!("connection error: {}", error))
    } else {
        PlanError::Transport(format!("http error: {}", error))
    }
}

/// Pull the generated text out of a response payload.
///
/// Prefers the first candidate's first part; falls back to a top-level `text`
/// field, and finally to the stringified payload rather than failing.
fn extract_text(payload: &Value) -> String {
    if let Some(text) = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
    {
        return text.to_string();
    }
    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    payload.to_string()
}

/// Real HTTP transport against the Generative Language REST API.
pub struct HttpBackend {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl HttpBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self, PlanError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlanError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            url: format!("{}/{}:generateContent", GENAI_ENDPOINT, config.model_id()),
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn generate(&self, prompt: &str) -> Result<String, PlanError> {
        let api_key = self.api_key.as_deref().ok_or(PlanError::MissingCredential)?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationOptions {
                temperature: 0.2,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PlanError::HttpStatus { status, body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| PlanError::MalformedResponse(e.to_string()))?;

        Ok(extract_text(&payload))
    }
}

/// Retrying wrapper over a [`GenerationBackend`].
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    max_retries: u32,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            backend,
            model: model.into(),
            max_retries,
        }
    }

    /// Build a client with the real HTTP transport.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, PlanError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        Ok(Self::new(backend, config.model.clone(), config.max_retries))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the endpoint, retrying transport failures with exponential
    /// backoff (1 s, 2 s, 4 s, ...). Non-retryable errors and exhausted
    /// retries re-raise the last error to the orchestrator.
    pub async fn call(&self, goal: &str) -> Result<String, PlanError> {
        let prompt = build_prompt(goal);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.backend.generate(&prompt).await {
                Ok(text) => {
                    debug!(attempt, "generation attempt succeeded");
                    return Ok(text);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    warn!(attempt, error = %err, "generation attempt failed");
                    last_error = Some(err);
                    if attempt < self.max_retries {
                        let delay = Duration::from_millis(1000u64 << attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PlanError::Transport("no attempts executed".to_string())))
    }
}

/// Prompt asking the model for a strict JSON array of tasks.
fn build_prompt(goal: &str) -> String {
    format!(
        "Break down this goal into actionable tasks with suggested durations, dependencies and deadlines.\n\n\
         Goal: {}\n\n\
         Return ONLY valid JSON. The top level should be an array of tasks. Each task should be an object \
         with keys: name (string), dependsOn (array of strings), duration (string), deadline (string). \
         Example output:\n\
         [ {{ \"name\": \"Market research\", \"dependsOn\": [], \"duration\": \"2 days\", \"deadline\": \"Day 2\" }}, ... ]",
        goal
    )
}
