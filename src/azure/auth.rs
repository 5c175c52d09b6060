//! Azure Authentication
//!
//! Acquires ARM bearer tokens from a static token, a service principal
//! secret, or the managed identity endpoint Azure Functions exposes.
//! The scrapper never inspects credentials; it only hands them to the
//! client factories.

use super::http::ArmHttpClient;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// OAuth2 scope for Azure Resource Manager (client credentials flow)
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Resource URI for Azure Resource Manager (managed identity flow)
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Default Microsoft Entra authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const MANAGED_IDENTITY_API_VERSION: &str = "2019-08-01";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of bearer tokens for ARM requests
pub trait TokenCredential: Send + Sync {
    fn get_token(&self) -> BoxFuture<'_, Result<String>>;
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Token cache shared by the refreshing credentials
#[derive(Clone, Default)]
struct TokenCache {
    inner: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenCache {
    /// Return the cached token, or fetch and cache a new one.
    /// `fetch` yields the token and its lifetime when known.
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Option<Duration>)>>,
    {
        {
            let cache = self.inner.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let (token, ttl) = fetch().await?;
        let ttl = ttl.unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.inner.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token)
    }
}

/// Token endpoint response (Entra ID v2 and App Service managed identity)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until expiry; a number from Entra ID, sometimes a string
    #[serde(default)]
    expires_in: Option<Value>,
    /// Absolute expiry as epoch seconds (managed identity)
    #[serde(default)]
    expires_on: Option<Value>,
}

fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl TokenResponse {
    /// Remaining token lifetime, preferring the relative field.
    /// An expiry already in the past is a zero lifetime, not an unknown one.
    fn ttl(&self) -> Option<Duration> {
        if let Some(secs) = self.expires_in.as_ref().and_then(lenient_u64) {
            return Some(Duration::from_secs(secs));
        }
        let epoch = self.expires_on.as_ref().and_then(lenient_u64)?;
        let expires_on = DateTime::<Utc>::from_timestamp(i64::try_from(epoch).ok()?, 0)?;
        Some((expires_on - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

/// A pre-acquired bearer token, e.g. from `az account get-access-token`
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenCredential for StaticTokenCredential {
    fn get_token(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}

/// Service principal authenticating with a client secret
#[derive(Clone)]
pub struct ClientSecretCredential {
    http: ArmHttpClient,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: TokenCache,
}

impl ClientSecretCredential {
    pub fn new(
        http: ArmHttpClient,
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cache: TokenCache::default(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host,
            urlencoding::encode(&self.tenant_id)
        )
    }

    async fn request_token(&self) -> Result<(String, Option<Duration>)> {
        let request = self.http.client().post(self.token_url()).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", ARM_SCOPE),
        ]);
        let response: TokenResponse = self
            .http
            .send_json(request)
            .await
            .context("Failed to get access token")?;
        let ttl = response.ttl();
        Ok((response.access_token, ttl))
    }
}

impl TokenCredential for ClientSecretCredential {
    fn get_token(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.cache.get_or_fetch(|| self.request_token()))
    }
}

/// Managed identity via the App Service / Functions identity endpoint
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    http: ArmHttpClient,
    endpoint: String,
    header: String,
    client_id: Option<String>,
    cache: TokenCache,
}

impl ManagedIdentityCredential {
    pub fn new(http: ArmHttpClient, endpoint: &str, header: &str, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            header: header.to_string(),
            client_id,
            cache: TokenCache::default(),
        }
    }

    async fn request_token(&self) -> Result<(String, Option<Duration>)> {
        let mut query = vec![
            ("resource", ARM_RESOURCE),
            ("api-version", MANAGED_IDENTITY_API_VERSION),
        ];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }
        let request = self
            .http
            .client()
            .get(&self.endpoint)
            .query(&query)
            .header("X-IDENTITY-HEADER", &self.header);
        let response: TokenResponse = self
            .http
            .send_json(request)
            .await
            .context("Failed to get managed identity token")?;
        let ttl = response.ttl();
        Ok((response.access_token, ttl))
    }
}

impl TokenCredential for ManagedIdentityCredential {
    fn get_token(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.cache.get_or_fetch(|| self.request_token()))
    }
}

/// Pick a credential from the process environment
pub fn default_credential(http: &ArmHttpClient) -> Result<Arc<dyn TokenCredential>> {
    credential_from_lookup(http, |key| std::env::var(key).ok())
}

/// Pick a credential from `lookup`, in order: `AZURE_ACCESS_TOKEN`,
/// service principal secret, managed identity endpoint
pub fn credential_from_lookup<L>(http: &ArmHttpClient, lookup: L) -> Result<Arc<dyn TokenCredential>>
where
    L: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("AZURE_ACCESS_TOKEN") {
        tracing::debug!("Using static access token credential");
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }

    if let (Some(tenant), Some(client), Some(secret)) = (
        get("AZURE_TENANT_ID"),
        get("AZURE_CLIENT_ID"),
        get("AZURE_CLIENT_SECRET"),
    ) {
        let authority = get("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
        tracing::debug!("Using client secret credential for tenant {}", tenant);
        return Ok(Arc::new(ClientSecretCredential::new(
            http.clone(),
            &authority,
            &tenant,
            &client,
            &secret,
        )));
    }

    if let (Some(endpoint), Some(header)) = (get("IDENTITY_ENDPOINT"), get("IDENTITY_HEADER")) {
        tracing::debug!("Using managed identity credential");
        return Ok(Arc::new(ManagedIdentityCredential::new(
            http.clone(),
            &endpoint,
            &header,
            get("AZURE_CLIENT_ID"),
        )));
    }

    anyhow::bail!(
        "no Azure credential configured: set AZURE_ACCESS_TOKEN, the AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET trio, or run with a managed identity"
    )
}
