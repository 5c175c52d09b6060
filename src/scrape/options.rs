//! Scrapper options
//!
//! One factory slot per resource kind. Every slot defaults to the ARM binding;
//! replacing a slot swaps that kind's backend without touching the paginator
//! or the orchestration.

use super::context::DEFAULT_RUN_TIMEOUT;
use super::model::{
    AgentPool, ClusterScope, DiskEncryptionSet, ManagedCluster, Provider, ResourceGroup,
    VirtualNetwork,
};
use super::page::PageSource;
use crate::azure::auth::TokenCredential;
use crate::azure::client::{ArmClient, ClientOptions};
use crate::azure::pager::ArmPager;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Builds a backend client for one subscription
pub type ClientFactory<C> =
    Arc<dyn Fn(&str, &Arc<dyn TokenCredential>, &ClientOptions) -> Result<C> + Send + Sync>;

pub type ResourceGroupsFactory = ClientFactory<Arc<dyn PageSource<ResourceGroup>>>;
pub type ProvidersFactory = ClientFactory<Arc<dyn PageSource<Provider>>>;
pub type VirtualNetworksFactory = ClientFactory<Arc<dyn PageSource<VirtualNetwork>>>;
pub type DiskEncryptionSetsFactory = ClientFactory<Arc<dyn PageSource<DiskEncryptionSet>>>;
pub type ClustersFactory = ClientFactory<Arc<dyn PageSource<ManagedCluster>>>;
pub type NodePoolsFactory = ClientFactory<Arc<dyn NodePoolSource>>;

/// Node pools are listed per cluster, so their client hands out one
/// paginated source per cluster scope
pub trait NodePoolSource: Send + Sync {
    fn for_cluster(&self, scope: &ClusterScope) -> Result<Arc<dyn PageSource<AgentPool>>>;
}

impl<F> NodePoolSource for F
where
    F: Fn(&ClusterScope) -> Result<Arc<dyn PageSource<AgentPool>>> + Send + Sync,
{
    fn for_cluster(&self, scope: &ClusterScope) -> Result<Arc<dyn PageSource<AgentPool>>> {
        self(scope)
    }
}

/// ARM agent pool listing
struct ArmNodePools {
    client: ArmClient,
}

impl NodePoolSource for ArmNodePools {
    fn for_cluster(&self, scope: &ClusterScope) -> Result<Arc<dyn PageSource<AgentPool>>> {
        let url = self
            .client
            .agent_pools_url(&scope.resource_group, &scope.cluster_name)?;
        Ok(Arc::new(ArmPager::<AgentPool>::new(self.client.clone(), url)))
    }
}

/// Factory for a subscription-wide ARM list operation
fn arm_factory<T>(first_page: fn(&ArmClient) -> Result<String>) -> ClientFactory<Arc<dyn PageSource<T>>>
where
    T: DeserializeOwned + Send + 'static,
{
    Arc::new(
        move |subscription: &str,
              credential: &Arc<dyn TokenCredential>,
              options: &ClientOptions|
              -> Result<Arc<dyn PageSource<T>>> {
            let client = ArmClient::new(subscription, credential.clone(), options)?;
            let url = first_page(&client)?;
            Ok(Arc::new(ArmPager::<T>::new(client, url)))
        },
    )
}

fn arm_node_pools_factory() -> NodePoolsFactory {
    Arc::new(
        |subscription: &str,
         credential: &Arc<dyn TokenCredential>,
         options: &ClientOptions|
         -> Result<Arc<dyn NodePoolSource>> {
            let client = ArmClient::new(subscription, credential.clone(), options)?;
            Ok(Arc::new(ArmNodePools { client }))
        },
    )
}

/// Construction options for a [`Scrapper`](super::Scrapper)
#[derive(Clone)]
pub struct ScrapperOptions {
    pub(crate) client_options: ClientOptions,
    pub(crate) timeout: Duration,
    pub(crate) resource_groups: ResourceGroupsFactory,
    pub(crate) providers: ProvidersFactory,
    pub(crate) virtual_networks: VirtualNetworksFactory,
    pub(crate) disk_encryption_sets: DiskEncryptionSetsFactory,
    pub(crate) clusters: ClustersFactory,
    pub(crate) node_pools: NodePoolsFactory,
}

impl Default for ScrapperOptions {
    fn default() -> Self {
        Self {
            client_options: ClientOptions::default(),
            timeout: DEFAULT_RUN_TIMEOUT,
            resource_groups: arm_factory(ArmClient::resource_groups_url),
            providers: arm_factory(ArmClient::providers_url),
            virtual_networks: arm_factory(ArmClient::virtual_networks_url),
            disk_encryption_sets: arm_factory(ArmClient::disk_encryption_sets_url),
            clusters: arm_factory(ArmClient::managed_clusters_url),
            node_pools: arm_node_pools_factory(),
        }
    }
}

impl ScrapperOptions {
    /// Options passed to every factory (ARM endpoint, request timeout)
    pub fn with_client_options(mut self, client_options: ClientOptions) -> Self {
        self.client_options = client_options;
        self
    }

    /// Wall-clock budget for one run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_resource_groups_factory(mut self, factory: ResourceGroupsFactory) -> Self {
        self.resource_groups = factory;
        self
    }

    pub fn with_providers_factory(mut self, factory: ProvidersFactory) -> Self {
        self.providers = factory;
        self
    }

    pub fn with_virtual_networks_factory(mut self, factory: VirtualNetworksFactory) -> Self {
        self.virtual_networks = factory;
        self
    }

    pub fn with_disk_encryption_sets_factory(mut self, factory: DiskEncryptionSetsFactory) -> Self {
        self.disk_encryption_sets = factory;
        self
    }

    pub fn with_clusters_factory(mut self, factory: ClustersFactory) -> Self {
        self.clusters = factory;
        self
    }

    pub fn with_node_pools_factory(mut self, factory: NodePoolsFactory) -> Self {
        self.node_pools = factory;
        self
    }
}

/// Factory that always hands out `client`, ignoring subscription and credential
pub fn fixed_client<C>(client: C) -> ClientFactory<C>
where
    C: Clone + Send + Sync + 'static,
{
    Arc::new(
        move |_: &str, _: &Arc<dyn TokenCredential>, _: &ClientOptions| -> Result<C> {
            Ok(client.clone())
        },
    )
}

/// Factory that always fails with `message`
pub fn failing_factory<C>(message: &'static str) -> ClientFactory<C>
where
    C: 'static,
{
    Arc::new(
        move |_: &str, _: &Arc<dyn TokenCredential>, _: &ClientOptions| -> Result<C> {
            Err(anyhow::anyhow!(message))
        },
    )
}
