//! Model-service backends and their traits.
//!
//! Backends:
//!   OllamaBackend — local Ollama, /api/embeddings (one prompt per call)
//!   OpenAiBackend — OpenAI chat completions (gpt-4.1, gpt-4o, …), or any
//!                   OpenAI-compatible endpoint via base_url
//!
//! The traits are the substitution seams: retrieval code is written
//! against `EmbeddingBackend` / `CompletionBackend` so tests can drive it
//! with in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Traits ────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Model identifier; the vector-field name in the index derives from it.
    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn model_id(&self) -> &str;
}

// ── Helpers: OpenAI-style responses ──────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> CompletionResponse {
    CompletionResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

// ── Ollama (embeddings) ───────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({"model": &self.model, "prompt": text});
        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        let vec: Vec<f32> = serde_json::from_value(json["embedding"].clone())?;
        Ok(vec)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ── OpenAI (chat completions) ─────────────────────────────────────────────────

pub struct OpenAiBackend {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at an OpenAI-compatible endpoint instead of api.openai.com.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    req.messages,
            "temperature": req.temperature.unwrap_or(0.0),
        });
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
