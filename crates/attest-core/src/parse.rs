//! Two-tier parsing of judge replies: strict JSON first, first-line token
//! matching as the fallback.

/// Outcome extracted from a judge reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub reasoning: String,
}

/// Parse a judge reply into a verdict. Never fails: replies that survive
/// neither tier simply come back as a FAIL with the raw text as reasoning.
pub fn parse_reply(reply: &str) -> Verdict {
    match parse_structured(reply) {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::debug!(error = %err, "structured parse failed, using line fallback");
            parse_fallback(reply)
        }
    }
}

/// Tier 1: the reply is a JSON object, optionally wrapped in a markdown
/// fence, with string keys `result` and `reasoning`. A missing `result` key
/// is a FAIL; a non-string `result` is a parse error and falls through to
/// tier 2.
pub(crate) fn parse_structured(reply: &str) -> anyhow::Result<Verdict> {
    let text = strip_markdown_fences(reply.trim());
    let data: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let result = match data.get("result") {
        Some(value) => value
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'result' field is not a string"))?,
        None => "",
    };
    let reasoning = data
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(Verdict {
        passed: result.to_uppercase() == "PASS",
        reasoning: reasoning.to_string(),
    })
}

/// Tier 2: the first line decides the verdict, the rest is the reasoning.
/// With no newline the entire raw reply doubles as the reasoning.
pub(crate) fn parse_fallback(reply: &str) -> Verdict {
    let trimmed = reply.trim();
    let (first_line, rest) = match trimmed.split_once('\n') {
        Some((first_line, rest)) => (first_line, Some(rest)),
        None => (trimmed, None),
    };
    let token = first_line.trim().to_uppercase();
    let passed = matches!(token.as_str(), "PASS" | "YES" | "TRUE" | "PASSED");
    let reasoning = match rest {
        Some(rest) => rest.trim().to_string(),
        None => reply.to_string(),
    };
    Verdict { passed, reasoning }
}

/// Strip a leading triple-backtick fence: keep the text between the first
/// fence and the next one (or the rest if unclosed), dropping a leading
/// `json` language tag.
fn strip_markdown_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner.strip_prefix("json").unwrap_or(inner).trim()
}
