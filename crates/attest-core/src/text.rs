use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// `${NAME}` placeholder; NAME is anything up to the closing brace.
    static ref ENV_PLACEHOLDER: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
}

/// Expand `${NAME}` placeholders from the process environment. Unset
/// variables are left verbatim, delimiters included.
pub fn expand_env_vars(value: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(value, |caps: &Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Cap `text` at `max_chars` characters. Longer input keeps the first
/// `max_chars - 3` characters and gains a `...` suffix, so the output of an
/// over-long input is always exactly `max_chars` long.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}
