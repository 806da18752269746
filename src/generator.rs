//! Text-generation backends.
//!
//! The orchestrator sees generation as a black box behind the [`Generator`]
//! trait: a prompt and parameters in, a string out. Concrete backends:
//!
//! - **[`OllamaGenerator`]**: `POST {base_url}/api/generate` with
//!   `stream: false`.
//! - **[`DisabledGenerator`]**: always unavailable; used when
//!   `generator.provider = "disabled"`.
//!
//! # Failure classification
//!
//! | Condition | Error | Retried by the orchestrator |
//! |-----------|-------|-----------------------------|
//! | Request exceeded the attempt timeout | [`GenerateError::Timeout`] | yes |
//! | Connection failure, HTTP 429 or 5xx | [`GenerateError::BackendUnavailable`] | yes |
//! | Other HTTP 4xx, malformed response body | [`GenerateError::Rejected`] | no |

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::GeneratorConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("generator timed out")]
    Timeout,

    #[error("generator backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("generator rejected the request: {0}")]
    Rejected(String),
}

impl GenerateError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerateError::Timeout | GenerateError::BackendUnavailable(_)
        )
    }
}

/// Sampling parameters for one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateParams {
    /// In `[0.0, 1.0]`.
    pub temperature: f64,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier reported back to callers.
    fn model(&self) -> &str;

    /// Produce a completion for `prompt`.
    ///
    /// Implementations need not enforce a deadline themselves; the
    /// orchestrator wraps every call in a timeout and drops the future when
    /// it expires.
    async fn generate(&self, prompt: &str, params: &GenerateParams) -> Result<String, GenerateError>;

    /// Cheap liveness probe used by the health endpoint.
    async fn is_reachable(&self) -> bool;
}

/// A generator that is never available.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerateParams) -> Result<String, GenerateError> {
        Err(GenerateError::BackendUnavailable(
            "generator provider is disabled".to_string(),
        ))
    }

    async fn is_reachable(&self) -> bool {
        false
    }
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn classify_transport(err: reqwest::Error) -> GenerateError {
        if err.is_timeout() {
            GenerateError::Timeout
        } else {
            GenerateError::BackendUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerateParams) -> Result<String, GenerateError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": params.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            let parsed: OllamaGenerateResponse = response.json().await.map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Rejected(format!("malformed response: {}", e))
                }
            })?;
            return Ok(parsed.response);
        }

        let body_text = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<body unreadable: {}>", e));
        Err(status_error(status, &body_text))
    }

    async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "generator health probe failed");
                false
            }
        }
    }
}

/// Build the configured generator.
pub fn create_generator(config: &GeneratorConfig) -> anyhow::Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generator provider: {}", other),
    }
}

/// Classify a non-success HTTP status. 429 and 5xx are worth retrying.
fn status_error(status: reqwest::StatusCode, body: &str) -> GenerateError {
    let message = format!("HTTP {}: {}", status, body);
    if status.as_u16() == 429 || status.is_server_error() {
        GenerateError::BackendUnavailable(message)
    } else {
        GenerateError::Rejected(message)
    }
}
