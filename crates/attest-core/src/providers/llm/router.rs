//! Multi-provider chat transport. Routes on the `provider/` prefix of the
//! model string and normalizes every backend to the common completion shape.

use super::{ChatCompletion, ChatMessage, ChatRequest, LlmClient, TransportError};
use crate::auth::TokenProvider;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

pub struct RouterClient {
    client: reqwest::Client,
}

impl RouterClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for RouterClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) enum AuthScheme {
    Bearer(String),
    ApiKeyHeader(String),
    Entra(Arc<dyn TokenProvider>),
    None,
}

impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::ApiKeyHeader(_) => f.write_str("ApiKeyHeader(..)"),
            Self::Entra(provider) => write!(f, "Entra({})", provider.source()),
            Self::None => f.write_str("None"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Route {
    pub(crate) url: String,
    /// Model name as the backend expects it in the request body.
    pub(crate) model: String,
    pub(crate) auth: AuthScheme,
    pub(crate) provider: &'static str,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn static_key(request: &ChatRequest, env_var: &str) -> Option<String> {
    request
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| non_empty_env(env_var))
}

fn compatible_url(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

pub(crate) fn resolve_route(request: &ChatRequest) -> Result<Route, TransportError> {
    if let Some(name) = request.model.strip_prefix("openai/") {
        let url = match &request.api_base {
            Some(base) => compatible_url(base),
            None => OPENAI_URL.to_string(),
        };
        let key = static_key(request, "OPENAI_API_KEY").ok_or(TransportError::MissingKey {
            provider: "openai",
            env_hint: "OPENAI_API_KEY",
        })?;
        return Ok(Route {
            url,
            model: name.to_string(),
            auth: AuthScheme::Bearer(key),
            provider: "openai",
        });
    }

    if let Some(name) = request.model.strip_prefix("openrouter/") {
        let url = match &request.api_base {
            Some(base) => compatible_url(base),
            None => OPENROUTER_URL.to_string(),
        };
        let key = static_key(request, "OPENROUTER_API_KEY").ok_or(TransportError::MissingKey {
            provider: "openrouter",
            env_hint: "OPENROUTER_API_KEY",
        })?;
        return Ok(Route {
            url,
            model: name.to_string(),
            auth: AuthScheme::Bearer(key),
            provider: "openrouter",
        });
    }

    if let Some(deployment) = request.model.strip_prefix("azure/") {
        let base = request
            .api_base
            .clone()
            .or_else(|| non_empty_env("AZURE_API_BASE"))
            .ok_or(TransportError::MissingApiBase { provider: "azure" })?;
        let api_version = request
            .extra
            .get("api_version")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_AZURE_API_VERSION);
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            base.trim_end_matches('/'),
            deployment,
            api_version
        );
        let auth = match static_key(request, "AZURE_API_KEY") {
            Some(key) => AuthScheme::ApiKeyHeader(key),
            None => match &request.token_provider {
                Some(provider) => AuthScheme::Entra(provider.clone()),
                None => {
                    return Err(TransportError::MissingKey {
                        provider: "azure",
                        env_hint: "AZURE_API_KEY",
                    })
                }
            },
        };
        return Ok(Route {
            url,
            model: deployment.to_string(),
            auth,
            provider: "azure",
        });
    }

    // Anything else with an explicit base is treated as OpenAI-compatible,
    // model string passed through untouched.
    if let Some(base) = &request.api_base {
        let auth = match request.api_key.clone().filter(|k| !k.is_empty()) {
            Some(key) => AuthScheme::Bearer(key),
            None => AuthScheme::None,
        };
        return Ok(Route {
            url: compatible_url(base),
            model: request.model.clone(),
            auth,
            provider: "custom",
        });
    }

    Err(TransportError::UnknownProvider {
        model: request.model.clone(),
    })
}

/// Request body: model, messages, plus every extra entry merged in as-is.
/// `api_version` is routing input for azure and stays out of the body.
fn build_body(
    model: &str,
    messages: &[ChatMessage],
    extra: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<serde_json::Value> {
    let mut body = serde_json::Map::new();
    body.insert("model".to_string(), serde_json::Value::String(model.to_string()));
    body.insert("messages".to_string(), serde_json::to_value(messages)?);
    for (key, value) in extra {
        if key == "api_version" {
            continue;
        }
        body.insert(key.clone(), value.clone());
    }
    Ok(serde_json::Value::Object(body))
}

#[async_trait]
impl LlmClient for RouterClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatCompletion> {
        let route = resolve_route(request)?;
        let body = build_body(&route.model, &request.messages, &request.extra)?;

        let mut http = self.client.post(&route.url).json(&body);
        match &route.auth {
            AuthScheme::Bearer(key) => {
                http = http.header("Authorization", format!("Bearer {key}"));
            }
            AuthScheme::ApiKeyHeader(key) => {
                http = http.header("api-key", key);
            }
            AuthScheme::Entra(provider) => {
                let token = provider
                    .bearer_token()
                    .await
                    .with_context(|| format!("acquiring azure token via {}", provider.source()))?;
                http = http.header("Authorization", format!("Bearer {token}"));
            }
            AuthScheme::None => {}
        }

        tracing::debug!(provider = route.provider, url = %route.url, "chat completion request");
        let resp = http.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_else(|_| String::new());
            return Err(TransportError::Provider {
                provider: route.provider,
                status: status.as_u16(),
                detail,
            }
            .into());
        }

        let mut completion: ChatCompletion = resp.json().await?;
        if completion.cost.is_none() {
            completion.cost = completion.usage.as_ref().and_then(|u| u.cost);
        }
        Ok(completion)
    }

    fn provider_name(&self) -> &'static str {
        "router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn bearer_token(&self) -> anyhow::Result<String> {
            Ok("tok".to_string())
        }

        fn source(&self) -> &'static str {
            "static"
        }
    }

    fn request(model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user("hi")],
            api_key: Some("test-key".to_string()),
            api_base: None,
            extra: serde_json::Map::new(),
            token_provider: None,
        }
    }

    #[test]
    fn openai_routes_to_default_endpoint() {
        let route = resolve_route(&request("openai/gpt-5-mini")).unwrap();
        assert_eq!(route.url, OPENAI_URL);
        assert_eq!(route.model, "gpt-5-mini");
        assert_eq!(route.provider, "openai");
        assert!(matches!(route.auth, AuthScheme::Bearer(ref k) if k == "test-key"));
    }

    #[test]
    fn openai_honors_custom_api_base() {
        let mut req = request("openai/gpt-5-mini");
        req.api_base = Some("https://proxy.example/v1/".to_string());
        let route = resolve_route(&req).unwrap();
        assert_eq!(route.url, "https://proxy.example/v1/chat/completions");
    }

    #[test]
    #[serial]
    fn openai_missing_key_is_typed_error() {
        std::env::remove_var("OPENAI_API_KEY");
        let mut req = request("openai/gpt-5-mini");
        req.api_key = None;
        let err = resolve_route(&req).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingKey {
                provider: "openai",
                ..
            }
        ));
    }

    #[test]
    #[serial]
    fn openai_falls_back_to_env_key() {
        std::env::set_var("OPENAI_API_KEY", "from-env");
        let mut req = request("openai/gpt-5-mini");
        req.api_key = None;
        let route = resolve_route(&req).unwrap();
        assert!(matches!(route.auth, AuthScheme::Bearer(ref k) if k == "from-env"));
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn empty_request_key_counts_as_absent() {
        std::env::remove_var("OPENAI_API_KEY");
        let mut req = request("openai/gpt-5-mini");
        req.api_key = Some(String::new());
        assert!(resolve_route(&req).is_err());
    }

    #[test]
    fn openrouter_routes_to_openrouter() {
        let route = resolve_route(&request("openrouter/meta-llama/llama-3-8b")).unwrap();
        assert_eq!(route.url, OPENROUTER_URL);
        assert_eq!(route.model, "meta-llama/llama-3-8b");
        assert_eq!(route.provider, "openrouter");
    }

    #[test]
    fn azure_builds_deployment_url() {
        let mut req = request("azure/gpt-4o-deploy");
        req.api_base = Some("https://my.openai.azure.com/".to_string());
        let route = resolve_route(&req).unwrap();
        assert_eq!(
            route.url,
            "https://my.openai.azure.com/openai/deployments/gpt-4o-deploy/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(route.model, "gpt-4o-deploy");
        assert!(matches!(route.auth, AuthScheme::ApiKeyHeader(ref k) if k == "test-key"));
    }

    #[test]
    fn azure_api_version_override_via_extra() {
        let mut req = request("azure/gpt-4o-deploy");
        req.api_base = Some("https://my.openai.azure.com".to_string());
        req.extra.insert(
            "api_version".to_string(),
            serde_json::json!("2025-01-01-preview"),
        );
        let route = resolve_route(&req).unwrap();
        assert!(route.url.ends_with("api-version=2025-01-01-preview"));
    }

    #[test]
    #[serial]
    fn azure_requires_api_base() {
        std::env::remove_var("AZURE_API_BASE");
        let err = resolve_route(&request("azure/gpt-4o-deploy")).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingApiBase { provider: "azure" }
        ));
    }

    #[test]
    #[serial]
    fn azure_without_key_uses_token_provider() {
        std::env::remove_var("AZURE_API_KEY");
        let mut req = request("azure/gpt-4o-deploy");
        req.api_base = Some("https://my.openai.azure.com".to_string());
        req.api_key = None;
        req.token_provider = Some(Arc::new(StaticToken));
        let route = resolve_route(&req).unwrap();
        assert!(matches!(route.auth, AuthScheme::Entra(_)));
    }

    #[test]
    #[serial]
    fn azure_without_any_auth_errors() {
        std::env::remove_var("AZURE_API_KEY");
        let mut req = request("azure/gpt-4o-deploy");
        req.api_base = Some("https://my.openai.azure.com".to_string());
        req.api_key = None;
        let err = resolve_route(&req).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingKey {
                provider: "azure",
                ..
            }
        ));
    }

    #[test]
    fn unknown_model_without_base_errors() {
        let err = resolve_route(&request("mystery-model")).unwrap_err();
        assert!(matches!(err, TransportError::UnknownProvider { ref model } if model == "mystery-model"));
    }

    #[test]
    fn explicit_base_passes_model_verbatim() {
        let mut req = request("together_ai/llama-3-70b");
        req.api_base = Some("https://api.together.xyz/v1".to_string());
        let route = resolve_route(&req).unwrap();
        assert_eq!(route.url, "https://api.together.xyz/v1/chat/completions");
        assert_eq!(route.model, "together_ai/llama-3-70b");
        assert_eq!(route.provider, "custom");
    }

    #[test]
    fn body_merges_extra_params() {
        let mut extra = serde_json::Map::new();
        extra.insert("temperature".to_string(), serde_json::json!(0.2));
        extra.insert("api_version".to_string(), serde_json::json!("2024-02-01"));
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("usr")];
        let body = build_body("gpt-5-mini", &messages, &extra).unwrap();
        assert_eq!(body["model"], "gpt-5-mini");
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("api_version").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
    }
}
