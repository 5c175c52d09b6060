//! ARM Client
//!
//! Main client for Azure Resource Manager, combining a credential, the HTTP
//! client and the subscription every list call is scoped to.

use super::auth::TokenCredential;
use super::http::ArmHttpClient;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Public Azure cloud ARM endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// api-version per ARM list operation
pub mod api_versions {
    pub const RESOURCES: &str = "2021-04-01";
    pub const NETWORK: &str = "2023-09-01";
    pub const COMPUTE: &str = "2023-04-02";
    pub const CONTAINER_SERVICE: &str = "2024-02-01";
}

/// Client construction options shared by every resource kind
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// ARM base URL, overridable for sovereign clouds and tests
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Validate an Azure subscription id
/// Subscription ids are GUIDs; only ASCII alphanumerics and hyphens are accepted
/// so the value can be embedded in a URL path verbatim
pub fn validate_subscription_id(subscription: &str) -> bool {
    !subscription.is_empty()
        && subscription.len() <= 64
        && subscription
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Main ARM client
#[derive(Clone)]
pub struct ArmClient {
    credential: Arc<dyn TokenCredential>,
    http: ArmHttpClient,
    endpoint: Url,
    subscription_id: String,
}

impl ArmClient {
    /// Create a client for one subscription
    pub fn new(
        subscription_id: &str,
        credential: Arc<dyn TokenCredential>,
        options: &ClientOptions,
    ) -> Result<Self> {
        if !validate_subscription_id(subscription_id) {
            anyhow::bail!("invalid subscription id: {:?}", subscription_id);
        }

        let mut endpoint = Url::parse(&options.endpoint)
            .with_context(|| format!("invalid ARM endpoint: {}", options.endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("ARM endpoint cannot be a base URL: {}", options.endpoint);
        }
        // `Url::join` replaces the last segment unless the base ends in '/'
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http = ArmHttpClient::new(options.request_timeout)?;

        Ok(Self {
            credential,
            http,
            endpoint,
            subscription_id: subscription_id.to_string(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Make an authenticated GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.credential.get_token().await?;
        self.http.get_json(url, &token).await
    }

    /// Build an ARM URL for `path` (relative to the endpoint) at `api_version`
    pub fn arm_url(&self, path: &str, api_version: &str) -> Result<String> {
        let mut url = self
            .endpoint
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid ARM path: {}", path))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url.to_string())
    }

    /// Build a subscription-scoped ARM URL
    pub fn subscription_url(&self, path: &str, api_version: &str) -> Result<String> {
        self.arm_url(
            &format!("subscriptions/{}/{}", self.subscription_id, path.trim_start_matches('/')),
            api_version,
        )
    }

    /// Check that a `nextLink` stays on the configured endpoint before following it
    /// Security: a bearer token must never be sent to a host chosen by a response
    pub fn validate_next_link(&self, next_link: &str) -> Result<()> {
        let next = Url::parse(next_link).context("invalid nextLink")?;
        if next.origin() != self.endpoint.origin() {
            anyhow::bail!("nextLink points outside the ARM endpoint: {}", next.origin().ascii_serialization());
        }
        Ok(())
    }

    // =========================================================================
    // List endpoints
    // =========================================================================

    pub fn resource_groups_url(&self) -> Result<String> {
        self.subscription_url("resourcegroups", api_versions::RESOURCES)
    }

    pub fn providers_url(&self) -> Result<String> {
        self.subscription_url("providers", api_versions::RESOURCES)
    }

    pub fn virtual_networks_url(&self) -> Result<String> {
        self.subscription_url("providers/Microsoft.Network/virtualNetworks", api_versions::NETWORK)
    }

    pub fn disk_encryption_sets_url(&self) -> Result<String> {
        self.subscription_url(
            "providers/Microsoft.Compute/diskEncryptionSets",
            api_versions::COMPUTE,
        )
    }

    pub fn managed_clusters_url(&self) -> Result<String> {
        self.subscription_url(
            "providers/Microsoft.ContainerService/managedClusters",
            api_versions::CONTAINER_SERVICE,
        )
    }

    pub fn agent_pools_url(&self, resource_group: &str, cluster_name: &str) -> Result<String> {
        self.subscription_url(
            &format!(
                "resourceGroups/{}/providers/Microsoft.ContainerService/managedClusters/{}/agentPools",
                urlencoding::encode(resource_group),
                urlencoding::encode(cluster_name)
            ),
            api_versions::CONTAINER_SERVICE,
        )
    }
}
