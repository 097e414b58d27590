use serde::Serialize;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "openai/gpt-5-mini";

/// Maximum characters kept in [`AssertionResult::content_preview`].
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Construction options for [`crate::assert::LlmAssert`].
#[derive(Debug, Clone)]
pub struct AssertOptions {
    /// Backend and model in `provider/model` form, e.g. `openai/gpt-5-mini`.
    pub model: String,
    /// Static API key. `${NAME}` placeholders are expanded from the
    /// environment once, at construction time.
    pub api_key: Option<String>,
    /// Custom endpoint base URL.
    pub api_base: Option<String>,
    /// Extra transport options (temperature, max_tokens, ...) passed through
    /// to the backend unmodified.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AssertOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Verdict for one evaluated criterion. Converts to `bool` for use inside
/// `assert!`.
#[derive(Debug, Clone, Serialize)]
pub struct AssertionResult {
    pub passed: bool,
    pub criterion: String,
    pub reasoning: String,
    pub content_preview: String,
}

impl From<AssertionResult> for bool {
    fn from(result: AssertionResult) -> bool {
        result.passed
    }
}

impl From<&AssertionResult> for bool {
    fn from(result: &AssertionResult) -> bool {
        result.passed
    }
}

impl std::fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        writeln!(f, "{verdict}: {:?}", self.criterion)?;
        writeln!(f, "  Content: {:?}", self.content_preview)?;
        write!(f, "  Reasoning: {}", self.reasoning)
    }
}

/// Backend-reported facts about the most recent call. Every field is
/// optional; backends differ in what they echo back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallMetadata {
    pub model: Option<String>,
    pub response_id: Option<String>,
    pub created: Option<i64>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cost: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_converts_to_bool() {
        let result = AssertionResult {
            passed: true,
            criterion: "is a greeting".to_string(),
            reasoning: "says hello".to_string(),
            content_preview: "hello".to_string(),
        };
        assert!(bool::from(&result));
        assert!(bool::from(result));
    }

    #[test]
    fn display_renders_verdict_block() {
        let result = AssertionResult {
            passed: false,
            criterion: "mentions pricing".to_string(),
            reasoning: "no prices anywhere".to_string(),
            content_preview: "hello".to_string(),
        };
        let rendered = result.to_string();
        assert!(rendered.starts_with("FAIL: \"mentions pricing\""));
        assert!(rendered.contains("Content: \"hello\""));
        assert!(rendered.contains("Reasoning: no prices anywhere"));
    }

    #[test]
    fn metadata_defaults_to_unset() {
        let meta = CallMetadata::default();
        assert!(meta.model.is_none());
        assert!(meta.total_tokens.is_none());
        assert!(meta.cost.is_none());
    }
}
