//! Azure Entra credential probing. Each source is checked with local-only
//! preconditions (env vars, PATH, cache files); the actual token round trip
//! is deferred to call time. Probe failures never surface, they just mean
//! "no provider".

use super::TokenProvider;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) const TOKEN_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
const TOKEN_RESOURCE: &str = "https://cognitiveservices.azure.com";

/// Probe the local credential chain: service-principal env vars, an `az`
/// CLI login, a managed-identity endpoint, then IDE token caches. Returns
/// the first usable source, or None when nothing is configured.
pub fn token_provider() -> Option<Arc<dyn TokenProvider>> {
    if let Some(sp) = ServicePrincipal::from_env() {
        tracing::debug!(source = sp.source(), "azure credential selected");
        return Some(Arc::new(sp));
    }
    if let Some(cli) = AzureCli::discover() {
        tracing::debug!(source = cli.source(), "azure credential selected");
        return Some(Arc::new(cli));
    }
    if let Some(mi) = ManagedIdentity::from_env() {
        tracing::debug!(source = mi.source(), "azure credential selected");
        return Some(Arc::new(mi));
    }
    #[cfg(feature = "ide-auth")]
    if let Some(ide) = IdeTokenCache::discover() {
        tracing::debug!(source = ide.source(), "azure credential selected");
        return Some(Arc::new(ide));
    }
    tracing::debug!("no azure credential source found");
    None
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn access_token_from(json: &serde_json::Value) -> anyhow::Result<String> {
    json.get("access_token")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("token response missing access_token"))
}

/// Client-credentials grant from AZURE_CLIENT_ID / AZURE_TENANT_ID /
/// AZURE_CLIENT_SECRET.
struct ServicePrincipal {
    client_id: String,
    tenant_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl ServicePrincipal {
    fn from_env() -> Option<Self> {
        Some(Self {
            client_id: non_empty_env("AZURE_CLIENT_ID")?,
            tenant_id: non_empty_env("AZURE_TENANT_ID")?,
            client_secret: non_empty_env("AZURE_CLIENT_SECRET")?,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipal {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.tenant_id
        );
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", TOKEN_SCOPE),
        ];
        let resp = self.http.post(&url).form(&params).send().await?;
        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_else(|_| String::new());
            anyhow::bail!("service principal token request failed: {}", detail);
        }
        let json: serde_json::Value = resp.json().await?;
        access_token_from(&json)
    }

    fn source(&self) -> &'static str {
        "service-principal"
    }
}

/// Shells out to a logged-in `az` CLI.
struct AzureCli;

impl AzureCli {
    fn discover() -> Option<Self> {
        find_in_path("az").map(|_| AzureCli)
    }
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
        // Windows installs az as a batch script.
        let cmd = dir.join(format!("{bin}.cmd"));
        if cmd.is_file() {
            return Some(cmd);
        }
    }
    None
}

#[async_trait]
impl TokenProvider for AzureCli {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        let output = tokio::process::Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                TOKEN_RESOURCE,
                "--output",
                "json",
            ])
            .output()
            .await
            .context("spawning az")?;
        if !output.status.success() {
            anyhow::bail!(
                "az account get-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        json.get("accessToken")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("az output missing accessToken"))
    }

    fn source(&self) -> &'static str {
        "azure-cli"
    }
}

/// App Service / Functions managed identity, configured through
/// IDENTITY_ENDPOINT (+ IDENTITY_HEADER) or the legacy MSI_ENDPOINT pair.
struct ManagedIdentity {
    endpoint: String,
    header: Option<String>,
    http: reqwest::Client,
}

impl ManagedIdentity {
    fn from_env() -> Option<Self> {
        if let Some(endpoint) = non_empty_env("IDENTITY_ENDPOINT") {
            return Some(Self {
                endpoint,
                header: non_empty_env("IDENTITY_HEADER"),
                http: reqwest::Client::new(),
            });
        }
        non_empty_env("MSI_ENDPOINT").map(|endpoint| Self {
            endpoint,
            header: non_empty_env("MSI_SECRET"),
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentity {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        let mut req = self.http.get(&self.endpoint).query(&[
            ("resource", TOKEN_RESOURCE),
            ("api-version", "2019-08-01"),
        ]);
        if let Some(header) = &self.header {
            req = req.header("X-IDENTITY-HEADER", header);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_else(|_| String::new());
            anyhow::bail!("managed identity token request failed: {}", detail);
        }
        let json: serde_json::Value = resp.json().await?;
        access_token_from(&json)
    }

    fn source(&self) -> &'static str {
        "managed-identity"
    }
}

/// Refresh grant against the MSAL token cache that VS Code and the Azure
/// account extensions maintain under ~/.azure.
#[cfg(feature = "ide-auth")]
struct IdeTokenCache {
    cache_path: PathBuf,
    http: reqwest::Client,
}

#[cfg(feature = "ide-auth")]
impl IdeTokenCache {
    /// Public client id registered for VS Code.
    const CLIENT_ID: &'static str = "aebc6443-996d-45c2-90f0-388ff96faa56";

    fn discover() -> Option<Self> {
        Self::at(&dirs::home_dir()?)
    }

    fn at(home: &std::path::Path) -> Option<Self> {
        let cache_path = home.join(".azure").join("msal_token_cache.json");
        cache_path.is_file().then(|| Self {
            cache_path,
            http: reqwest::Client::new(),
        })
    }
}

#[cfg(feature = "ide-auth")]
#[async_trait]
impl TokenProvider for IdeTokenCache {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        let raw = tokio::fs::read_to_string(&self.cache_path)
            .await
            .with_context(|| format!("reading {}", self.cache_path.display()))?;
        let cache: serde_json::Value = serde_json::from_str(&raw)?;
        let entries = cache
            .get("RefreshToken")
            .and_then(|v| v.as_object())
            .ok_or_else(|| anyhow::anyhow!("token cache has no RefreshToken section"))?;

        // Prefer the VS Code client's token; fall back to any entry.
        let mut refresh: Option<&str> = None;
        for entry in entries.values() {
            let Some(secret) = entry.get("secret").and_then(|v| v.as_str()) else {
                continue;
            };
            if entry.get("client_id").and_then(|v| v.as_str()) == Some(Self::CLIENT_ID) {
                refresh = Some(secret);
                break;
            }
            refresh.get_or_insert(secret);
        }
        let refresh = refresh.ok_or_else(|| anyhow::anyhow!("no refresh token in cache"))?;

        let params = [
            ("client_id", Self::CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("scope", TOKEN_SCOPE),
        ];
        let resp = self
            .http
            .post("https://login.microsoftonline.com/organizations/oauth2/v2.0/token")
            .form(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_else(|_| String::new());
            anyhow::bail!("refresh token grant failed: {}", detail);
        }
        let json: serde_json::Value = resp.json().await?;
        access_token_from(&json)
    }

    fn source(&self) -> &'static str {
        "ide-token-cache"
    }
}
