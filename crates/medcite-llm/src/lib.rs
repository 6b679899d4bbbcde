//! medcite-llm — Backends for the two external model services Medcite
//! talks to: Ollama for abstract/query embeddings and an OpenAI-style
//! chat completions endpoint for answer synthesis.

pub mod backend;

pub use backend::{
    CompletionBackend, CompletionRequest, CompletionResponse, EmbeddingBackend, LlmError, Message,
    OllamaBackend, OpenAiBackend,
};
