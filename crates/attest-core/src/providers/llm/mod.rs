use crate::auth::TokenProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod fake;
pub mod router;

pub use router::RouterClient;

/// Chat transport seam. Implementations either talk to a real backend
/// ([`RouterClient`]) or script replies ([`fake::FakeClient`]).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatCompletion>;
    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One completion request as the evaluator hands it to the transport.
#[derive(Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    /// Opaque backend options merged into the request body unmodified.
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Token-based auth, used by backends that accept bearer tokens instead
    /// of static keys.
    pub token_provider: Option<Arc<dyn TokenProvider>>,
}

/// Provider reply in the common chat-completion shape. Every field beyond
/// `choices` is best-effort; backends differ in what they return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub usage: Option<Usage>,
    /// Normalized request cost. OpenRouter reports this inside `usage`;
    /// [`RouterClient`] lifts it here.
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ReplyMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Transport boundary errors. Wrapped in `anyhow` on the way up but kept
/// typed so callers can downcast what propagated.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no provider route for model '{model}' (pass api_base for OpenAI-compatible backends)")]
    UnknownProvider { model: String },
    #[error("missing API key for {provider} (set {env_hint} or pass api_key)")]
    MissingKey {
        provider: &'static str,
        env_hint: &'static str,
    },
    #[error("missing api_base for {provider}")]
    MissingApiBase { provider: &'static str },
    #[error("{provider} chat API error (status {status}): {detail}")]
    Provider {
        provider: &'static str,
        status: u16,
        detail: String,
    },
}
