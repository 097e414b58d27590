use crate::auth::{azure, TokenProvider};
use crate::model::{AssertOptions, AssertionResult, CallMetadata, PREVIEW_MAX_CHARS};
use crate::parse;
use crate::prompt;
use crate::providers::llm::{ChatCompletion, ChatMessage, ChatRequest, LlmClient, RouterClient};
use crate::text;
use std::sync::{Arc, Mutex};

/// LLM-backed assertion evaluator. Owns the model configuration, sends one
/// system + user message pair per call, and parses the reply into a
/// pass/fail [`AssertionResult`].
pub struct LlmAssert {
    model: String,
    api_key: Option<String>,
    api_base: Option<String>,
    extra: serde_json::Map<String, serde_json::Value>,
    system_prompt: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    client: Arc<dyn LlmClient>,
    last_call: Mutex<Option<CallMetadata>>,
}

impl LlmAssert {
    /// Build an evaluator. `${NAME}` placeholders in the key are expanded
    /// here, once. Azure models without a usable static key trigger the
    /// local credential probe; its outcome never fails construction.
    pub fn new(options: AssertOptions) -> Self {
        let AssertOptions {
            model,
            api_key,
            api_base,
            extra,
        } = options;
        let api_key = api_key.map(|key| text::expand_env_vars(&key));
        let token_provider = if is_azure_model(&model) && !has_static_azure_key(&api_key) {
            azure::token_provider()
        } else {
            None
        };
        Self {
            model,
            api_key,
            api_base,
            extra,
            system_prompt: prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            token_provider,
            client: Arc::new(RouterClient::new()),
            last_call: Mutex::new(None),
        }
    }

    /// Shorthand for [`LlmAssert::new`] with only the model set.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self::new(AssertOptions {
            model: model.into(),
            ..Default::default()
        })
    }

    /// Swap the transport. Scripted clients go through here in tests and
    /// offline runs.
    pub fn with_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn api_base(&self) -> Option<&str> {
        self.api_base.as_deref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// Which credential source the construction-time probe selected, if any.
    pub fn credential_source(&self) -> Option<&'static str> {
        self.token_provider.as_ref().map(|p| p.source())
    }

    /// Backend-reported metadata for the most recent call. Unset until the
    /// first call completes; overwritten whole on every call, so concurrent
    /// callers race on it and the last writer wins.
    pub fn last_call(&self) -> Option<CallMetadata> {
        self.last_call.lock().unwrap().clone()
    }

    /// Evaluate `content` against a plain-English `criterion`.
    ///
    /// Transport failures propagate as-is; an unreachable judge must be
    /// loud, never a silent FAIL. Unparseable replies are the opposite:
    /// they always produce a verdict, defaulting to FAIL.
    pub async fn evaluate(
        &self,
        content: &str,
        criterion: &str,
    ) -> anyhow::Result<AssertionResult> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(prompt::build_user_message(criterion, content)),
            ],
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            extra: self.extra.clone(),
            token_provider: self.token_provider.clone(),
        };

        tracing::debug!(model = %self.model, "evaluating assertion");
        let completion = self.client.complete(&request).await?;

        let reply = completion
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("chat completion contained no choices"))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        self.record_call(&completion);

        let verdict = parse::parse_reply(&reply);
        tracing::debug!(passed = verdict.passed, "assertion evaluated");
        Ok(AssertionResult {
            passed: verdict.passed,
            criterion: criterion.to_string(),
            reasoning: verdict.reasoning,
            content_preview: text::truncate(content, PREVIEW_MAX_CHARS),
        })
    }

    fn record_call(&self, completion: &ChatCompletion) {
        let usage = completion.usage.as_ref();
        let meta = CallMetadata {
            model: completion.model.clone(),
            response_id: completion.id.clone(),
            created: completion.created,
            prompt_tokens: usage.and_then(|u| u.prompt_tokens),
            completion_tokens: usage.and_then(|u| u.completion_tokens),
            total_tokens: usage.and_then(|u| u.total_tokens),
            cost: completion.cost,
        };
        *self.last_call.lock().unwrap() = Some(meta);
    }
}

impl Default for LlmAssert {
    fn default() -> Self {
        Self::new(AssertOptions::default())
    }
}

fn is_azure_model(model: &str) -> bool {
    model.starts_with("azure/")
}

fn has_static_azure_key(api_key: &Option<String>) -> bool {
    if api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        return true;
    }
    std::env::var("AZURE_API_KEY").is_ok_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_MODEL;
    use serial_test::serial;

    fn set_service_principal_env() {
        std::env::set_var("AZURE_CLIENT_ID", "client");
        std::env::set_var("AZURE_TENANT_ID", "tenant");
        std::env::set_var("AZURE_CLIENT_SECRET", "secret");
    }

    fn clear_azure_env() {
        std::env::remove_var("AZURE_CLIENT_ID");
        std::env::remove_var("AZURE_TENANT_ID");
        std::env::remove_var("AZURE_CLIENT_SECRET");
        std::env::remove_var("AZURE_API_KEY");
    }

    #[test]
    fn defaults_mirror_options() {
        let checker = LlmAssert::default();
        assert_eq!(checker.model(), DEFAULT_MODEL);
        assert!(checker.api_key().is_none());
        assert!(checker.api_base().is_none());
        assert_eq!(checker.system_prompt(), prompt::DEFAULT_SYSTEM_PROMPT);
        assert!(checker.last_call().is_none());
    }

    #[test]
    fn system_prompt_is_replaceable() {
        let mut checker = LlmAssert::for_model("openai/gpt-5-mini");
        checker.set_system_prompt("Reply PASS always.");
        assert_eq!(checker.system_prompt(), "Reply PASS always.");
    }

    #[test]
    #[serial]
    fn api_key_placeholders_expand_at_construction() {
        std::env::set_var("ATTEST_KEY_SOURCE", "sk-expanded");
        let checker = LlmAssert::new(AssertOptions {
            api_key: Some("${ATTEST_KEY_SOURCE}".to_string()),
            ..Default::default()
        });
        assert_eq!(checker.api_key(), Some("sk-expanded"));
        std::env::remove_var("ATTEST_KEY_SOURCE");
    }

    #[test]
    #[serial]
    fn unset_placeholder_stays_verbatim() {
        std::env::remove_var("ATTEST_KEY_MISSING");
        let checker = LlmAssert::new(AssertOptions {
            api_key: Some("${ATTEST_KEY_MISSING}".to_string()),
            ..Default::default()
        });
        assert_eq!(checker.api_key(), Some("${ATTEST_KEY_MISSING}"));
    }

    #[test]
    #[serial]
    fn azure_model_without_key_probes_chain() {
        clear_azure_env();
        set_service_principal_env();
        let checker = LlmAssert::for_model("azure/gpt-4o-deploy");
        assert_eq!(checker.credential_source(), Some("service-principal"));
        clear_azure_env();
    }

    #[test]
    #[serial]
    fn explicit_key_suppresses_probe() {
        clear_azure_env();
        set_service_principal_env();
        let checker = LlmAssert::new(AssertOptions {
            model: "azure/gpt-4o-deploy".to_string(),
            api_key: Some("static-key".to_string()),
            ..Default::default()
        });
        assert!(checker.credential_source().is_none());
        clear_azure_env();
    }

    #[test]
    #[serial]
    fn azure_env_key_suppresses_probe() {
        clear_azure_env();
        set_service_principal_env();
        std::env::set_var("AZURE_API_KEY", "env-key");
        let checker = LlmAssert::for_model("azure/gpt-4o-deploy");
        assert!(checker.credential_source().is_none());
        clear_azure_env();
    }

    #[test]
    #[serial]
    fn non_azure_model_never_probes() {
        clear_azure_env();
        set_service_principal_env();
        let checker = LlmAssert::for_model("openai/gpt-5-mini");
        assert!(checker.credential_source().is_none());
        clear_azure_env();
    }

    #[test]
    #[serial]
    fn empty_expanded_key_still_probes() {
        clear_azure_env();
        set_service_principal_env();
        let checker = LlmAssert::new(AssertOptions {
            model: "azure/gpt-4o-deploy".to_string(),
            api_key: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(checker.credential_source(), Some("service-principal"));
        clear_azure_env();
    }
}
