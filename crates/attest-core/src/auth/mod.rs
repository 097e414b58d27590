use async_trait::async_trait;

pub mod azure;

/// Source of short-lived bearer tokens for backends that accept token-based
/// auth instead of static keys. Acquisition happens at call time; probing
/// for a usable source is the provider constructor's job.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> anyhow::Result<String>;
    fn source(&self) -> &'static str;
}
