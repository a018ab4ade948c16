//! Text-generation backend seam and the Ollama client
//!
//! Non-streaming completion against `POST /api/generate`. The payload is
//! decoded into a fixed record and checked before any text is used.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Phase, RagError, Result};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Transport-level timeout; the pipeline applies its own tighter budget
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Health probes must answer quickly
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Caller-supplied sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Opaque completion service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: SamplingParams) -> Result<String>;

    /// Reachability probe for the service layer
    async fn health_check(&self) -> bool;
}

/// Ollama connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// Fields we rely on from the generate response; extra fields are ignored
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: Option<String>,
    done: Option<bool>,
}

/// Decode and check a non-streaming generate payload
pub fn decode_completion(body: &str) -> Result<String> {
    let payload: OllamaGenerateResponse = serde_json::from_str(body)?;

    match payload.done {
        Some(true) => {}
        Some(false) => {
            return Err(RagError::InvalidResponse {
                field: "done",
                reason: "generation did not finish".to_string(),
            })
        }
        None => {
            return Err(RagError::InvalidResponse {
                field: "done",
                reason: "missing".to_string(),
            })
        }
    }

    let text = payload.response.ok_or_else(|| RagError::InvalidResponse {
        field: "response",
        reason: "missing".to_string(),
    })?;
    if text.trim().is_empty() {
        return Err(RagError::InvalidResponse {
            field: "response",
            reason: "empty completion".to_string(),
        });
    }

    Ok(text)
}

/// Ollama completion client
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn complete(&self, prompt: &str, params: SamplingParams) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RagError::upstream(Phase::Generation, format!("Failed to send request: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::upstream(
                Phase::Generation,
                format!("HTTP {}: {}", status, error_text),
            ));
        }

        let body = response.text().await?;
        decode_completion(&body)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
