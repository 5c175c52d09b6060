//! Scrapper
//!
//! Binds one paginated source per resource kind to a subscription and runs
//! the top-level listings concurrently under one deadline.

use super::context::ScrapeContext;
use super::error::ScrapeError;
use super::model::{
    AgentPool, ClusterScope, DiskEncryptionSet, ManagedCluster, Provider, ResourceGroup,
    ResourceKind, SubscriptionScope, VirtualNetwork,
};
use super::options::{NodePoolSource, ScrapperOptions};
use super::page::PageSource;
use super::paginator::paginate;
use crate::azure::auth::TokenCredential;
use crate::sink::ItemSink;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Lifecycle of one lister task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct TaskRecord {
    kind: ResourceKind,
    status: TaskStatus,
    error: Option<String>,
}

/// What a lister task hands back: its kind, and for the cluster lister the
/// node-pool scopes it discovered
type TaskOutput = (ResourceKind, Result<Vec<ClusterScope>, ScrapeError>);

/// Lists the resources of one subscription
#[derive(Clone)]
pub struct Scrapper {
    scope: SubscriptionScope,
    timeout: Duration,
    resource_groups: Arc<dyn PageSource<ResourceGroup>>,
    providers: Arc<dyn PageSource<Provider>>,
    virtual_networks: Arc<dyn PageSource<VirtualNetwork>>,
    disk_encryption_sets: Arc<dyn PageSource<DiskEncryptionSet>>,
    clusters: Arc<dyn PageSource<ManagedCluster>>,
    node_pools: Arc<dyn NodePoolSource>,
}

impl Scrapper {
    /// Build every lister for `subscription_id`.
    ///
    /// Fails with [`ScrapeError::Initialization`] as soon as one factory
    /// fails; nothing is listed in that case.
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        subscription_id: &str,
        options: ScrapperOptions,
    ) -> Result<Self, ScrapeError> {
        let client_options = &options.client_options;
        let init = |kind: ResourceKind| {
            move |source: anyhow::Error| {
                tracing::error!("Failed to initialize {} client: {:#}", kind, source);
                ScrapeError::Initialization { kind, source }
            }
        };

        let resource_groups = (options.resource_groups)(subscription_id, &credential, client_options)
            .map_err(init(ResourceKind::ResourceGroups))?;
        let providers = (options.providers)(subscription_id, &credential, client_options)
            .map_err(init(ResourceKind::Providers))?;
        let virtual_networks = (options.virtual_networks)(subscription_id, &credential, client_options)
            .map_err(init(ResourceKind::VirtualNetworks))?;
        let disk_encryption_sets =
            (options.disk_encryption_sets)(subscription_id, &credential, client_options)
                .map_err(init(ResourceKind::DiskEncryptionSets))?;
        let clusters = (options.clusters)(subscription_id, &credential, client_options)
            .map_err(init(ResourceKind::ManagedClusters))?;
        let node_pools = (options.node_pools)(subscription_id, &credential, client_options)
            .map_err(init(ResourceKind::NodePools))?;

        Ok(Self {
            scope: SubscriptionScope::new(subscription_id),
            timeout: options.timeout,
            resource_groups,
            providers,
            virtual_networks,
            disk_encryption_sets,
            clusters,
            node_pools,
        })
    }

    pub fn scope(&self) -> &SubscriptionScope {
        &self.scope
    }

    pub async fn list_resource_groups<F>(&self, ctx: &ScrapeContext, handler: F) -> Result<(), ScrapeError>
    where
        F: FnMut(ResourceGroup) -> anyhow::Result<()>,
    {
        paginate(ResourceKind::ResourceGroups, self.resource_groups.as_ref(), ctx, handler).await
    }

    pub async fn list_providers<F>(&self, ctx: &ScrapeContext, handler: F) -> Result<(), ScrapeError>
    where
        F: FnMut(Provider) -> anyhow::Result<()>,
    {
        paginate(ResourceKind::Providers, self.providers.as_ref(), ctx, handler).await
    }

    pub async fn list_virtual_networks<F>(&self, ctx: &ScrapeContext, handler: F) -> Result<(), ScrapeError>
    where
        F: FnMut(VirtualNetwork) -> anyhow::Result<()>,
    {
        paginate(ResourceKind::VirtualNetworks, self.virtual_networks.as_ref(), ctx, handler).await
    }

    pub async fn list_disk_encryption_sets<F>(&self, ctx: &ScrapeContext, handler: F) -> Result<(), ScrapeError>
    where
        F: FnMut(DiskEncryptionSet) -> anyhow::Result<()>,
    {
        paginate(
            ResourceKind::DiskEncryptionSets,
            self.disk_encryption_sets.as_ref(),
            ctx,
            handler,
        )
        .await
    }

    pub async fn list_clusters<F>(&self, ctx: &ScrapeContext, handler: F) -> Result<(), ScrapeError>
    where
        F: FnMut(ManagedCluster) -> anyhow::Result<()>,
    {
        paginate(ResourceKind::ManagedClusters, self.clusters.as_ref(), ctx, handler).await
    }

    /// List the node pools of one cluster
    pub async fn list_node_pools<F>(
        &self,
        ctx: &ScrapeContext,
        cluster: &ClusterScope,
        handler: F,
    ) -> Result<(), ScrapeError>
    where
        F: FnMut(AgentPool) -> anyhow::Result<()>,
    {
        let source = self
            .node_pools
            .for_cluster(cluster)
            .map_err(|source| ScrapeError::Initialization {
                kind: ResourceKind::NodePools,
                source,
            })?;
        paginate(ResourceKind::NodePools, source.as_ref(), ctx, handler).await
    }

    /// List the five top-level kinds concurrently, delivering every record
    /// to `sink`. Returns the first error any lister hit.
    pub async fn run<S: ItemSink>(&self, sink: Arc<S>) -> Result<(), ScrapeError> {
        let ctx = ScrapeContext::with_timeout(self.timeout);
        self.fan_out(&ctx, sink).await.map(|_| ())
    }

    /// [`run`](Self::run), then list the node pools of every discovered
    /// cluster one cluster at a time, under the same deadline
    pub async fn run_with_node_pools<S: ItemSink>(&self, sink: Arc<S>) -> Result<(), ScrapeError> {
        let ctx = ScrapeContext::with_timeout(self.timeout);
        let clusters = self.fan_out(&ctx, sink.clone()).await?;
        self.scrape_node_pools(&ctx, &clusters, sink.as_ref()).await
    }

    /// Sequentially list the node pools of `clusters`, stopping at the first error
    pub async fn scrape_node_pools<S: ItemSink>(
        &self,
        ctx: &ScrapeContext,
        clusters: &[ClusterScope],
        sink: &S,
    ) -> Result<(), ScrapeError> {
        for cluster in clusters {
            tracing::debug!(
                "Listing node pools of {}/{}",
                cluster.resource_group,
                cluster.cluster_name
            );
            self.list_node_pools(ctx, cluster, |pool| sink.accept(ResourceKind::NodePools, &pool))
                .await?;
        }
        Ok(())
    }

    async fn fan_out<S: ItemSink>(
        &self,
        ctx: &ScrapeContext,
        sink: Arc<S>,
    ) -> Result<Vec<ClusterScope>, ScrapeError> {
        let run_id = uuid::Uuid::new_v4();
        tracing::info!(
            "Run {} started for subscription {} ({}s budget)",
            run_id,
            self.scope.subscription_id,
            self.timeout.as_secs()
        );

        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();

        spawn_lister(&mut tasks, ResourceKind::ResourceGroups, {
            let (this, ctx, sink) = (self.clone(), ctx.clone(), sink.clone());
            async move {
                this.list_resource_groups(&ctx, |item| sink.accept(ResourceKind::ResourceGroups, &item))
                    .await
                    .map(|()| Vec::new())
            }
        });
        spawn_lister(&mut tasks, ResourceKind::Providers, {
            let (this, ctx, sink) = (self.clone(), ctx.clone(), sink.clone());
            async move {
                this.list_providers(&ctx, |item| sink.accept(ResourceKind::Providers, &item))
                    .await
                    .map(|()| Vec::new())
            }
        });
        spawn_lister(&mut tasks, ResourceKind::VirtualNetworks, {
            let (this, ctx, sink) = (self.clone(), ctx.clone(), sink.clone());
            async move {
                this.list_virtual_networks(&ctx, |item| sink.accept(ResourceKind::VirtualNetworks, &item))
                    .await
                    .map(|()| Vec::new())
            }
        });
        spawn_lister(&mut tasks, ResourceKind::DiskEncryptionSets, {
            let (this, ctx, sink) = (self.clone(), ctx.clone(), sink.clone());
            async move {
                this.list_disk_encryption_sets(&ctx, |item| {
                    sink.accept(ResourceKind::DiskEncryptionSets, &item)
                })
                .await
                .map(|()| Vec::new())
            }
        });
        spawn_lister(&mut tasks, ResourceKind::ManagedClusters, {
            let (this, ctx, sink) = (self.clone(), ctx.clone(), sink.clone());
            async move {
                let mut scopes = Vec::new();
                this.list_clusters(&ctx, |cluster| {
                    sink.accept(ResourceKind::ManagedClusters, &cluster)?;
                    match cluster.cluster_scope() {
                        Some(scope) => scopes.push(scope),
                        None => tracing::warn!("Cluster {:?} has no usable resource id", cluster.name),
                    }
                    Ok(())
                })
                .await?;
                Ok::<_, ScrapeError>(scopes)
            }
        });

        let mut records: Vec<TaskRecord> = ResourceKind::TOP_LEVEL
            .iter()
            .map(|&kind| TaskRecord {
                kind,
                status: TaskStatus::Running,
                error: None,
            })
            .collect();
        let mut first_error: Option<ScrapeError> = None;
        let mut task_failure: Option<String> = None;
        let mut clusters = Vec::new();

        // Every task is joined, even once the outcome is already decided
        while let Some(joined) = tasks.join_next().await {
            let (kind, result) = match joined {
                Ok(output) => output,
                Err(join_error) => {
                    tracing::error!("Lister task failed: {}", join_error);
                    if task_failure.is_none() {
                        task_failure = Some(join_error.to_string());
                    }
                    ctx.cancel();
                    if first_error.is_none() {
                        first_error = Some(ScrapeError::Task(join_error));
                    }
                    continue;
                },
            };

            let (status, error) = match result {
                Ok(found) => {
                    tracing::info!("Run {}: {} listing complete", run_id, kind);
                    clusters.extend(found);
                    (TaskStatus::Succeeded, None)
                },
                Err(err) => {
                    let message = err.to_string();
                    if first_error.is_none() {
                        tracing::warn!("Run {}: {} listing failed, cancelling siblings: {}", run_id, kind, err);
                        ctx.cancel();
                        first_error = Some(err);
                    } else {
                        tracing::debug!("Run {}: dropping later error from {}: {}", run_id, kind, err);
                    }
                    (TaskStatus::Failed, Some(message))
                },
            };

            if let Some(record) = records.iter_mut().find(|r| r.kind == kind) {
                record.status = status;
                record.error = error;
            }
        }

        settle_unjoined(&mut records, task_failure.as_deref());
        tracing::debug!("Run {} task outcomes: {:?}", run_id, records);

        match first_error {
            Some(err) => {
                tracing::error!("Run {} failed: {}", run_id, err);
                Err(err)
            },
            None => {
                tracing::info!("Run {} finished", run_id);
                Ok(clusters)
            },
        }
    }
}

/// A task whose output never arrived panicked or was aborted
fn settle_unjoined(records: &mut [TaskRecord], reason: Option<&str>) {
    for record in records.iter_mut().filter(|r| r.status == TaskStatus::Running) {
        record.status = TaskStatus::Failed;
        record.error = Some(reason.unwrap_or("lister task did not complete").to_string());
    }
}

fn spawn_lister<Fut>(tasks: &mut JoinSet<TaskOutput>, kind: ResourceKind, listing: Fut)
where
    Fut: Future<Output = Result<Vec<ClusterScope>, ScrapeError>> + Send + 'static,
{
    tasks.spawn(async move { (kind, listing.await) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::auth::StaticTokenCredential;
    use crate::scrape::memory::StaticPages;
    use crate::scrape::options::fixed_client;
    use crate::sink::CollectingSink;
    use serde_json::json;

    fn credential() -> Arc<dyn TokenCredential> {
        Arc::new(StaticTokenCredential::new("token"))
    }

    fn cluster(rg: &str, name: &str) -> ManagedCluster {
        serde_json::from_value(json!({
            "id": format!("/subscriptions/0000/resourceGroups/{rg}/providers/Microsoft.ContainerService/managedClusters/{name}"),
            "name": name,
        }))
        .unwrap()
    }

    fn pool(name: &str) -> AgentPool {
        AgentPool {
            name: Some(name.to_string()),
            ..AgentPool::default()
        }
    }

    fn empty<T: Clone + Send + Sync + 'static>() -> Arc<dyn PageSource<T>> {
        Arc::new(StaticPages::new(vec![]))
    }

    fn empty_options() -> ScrapperOptions {
        ScrapperOptions::default()
            .with_resource_groups_factory(fixed_client(empty()))
            .with_providers_factory(fixed_client(empty()))
            .with_virtual_networks_factory(fixed_client(empty()))
            .with_disk_encryption_sets_factory(fixed_client(empty()))
            .with_clusters_factory(fixed_client(empty()))
    }

    #[test]
    fn test_unjoined_tasks_are_marked_failed() {
        let mut records = vec![
            TaskRecord {
                kind: ResourceKind::ResourceGroups,
                status: TaskStatus::Succeeded,
                error: None,
            },
            TaskRecord {
                kind: ResourceKind::Providers,
                status: TaskStatus::Running,
                error: None,
            },
        ];

        settle_unjoined(&mut records, Some("task 7 panicked"));

        assert_eq!(records[0].status, TaskStatus::Succeeded);
        assert_eq!(records[1].status, TaskStatus::Failed);
        assert_eq!(records[1].error.as_deref(), Some("task 7 panicked"));
    }

    #[tokio::test]
    async fn test_panicking_lister_is_task_error() {
        let options = empty_options().with_providers_factory(fixed_client(
            Arc::new(StaticPages::single(vec![Provider::default()])) as Arc<dyn PageSource<Provider>>,
        ));
        let scrapper = Scrapper::new(credential(), "0000", options).unwrap();
        let sink = Arc::new(crate::sink::FnSink(
            |kind: ResourceKind, _: serde_json::Value| -> anyhow::Result<()> {
                if kind == ResourceKind::Providers {
                    panic!("sink blew up");
                }
                Ok(())
            },
        ));

        let err = scrapper.run(sink).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Task(_)));
        assert_eq!(err.kind(), None);
    }

    #[tokio::test]
    async fn test_default_factories_build_without_network() {
        let scrapper = Scrapper::new(credential(), "0000-1111", ScrapperOptions::default());
        assert!(scrapper.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_subscription_is_initialization_error() {
        let err = Scrapper::new(credential(), "not a subscription", ScrapperOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ScrapeError::Initialization {
                kind: ResourceKind::ResourceGroups,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_node_pools_listed_for_each_discovered_cluster() {
        let clusters: Arc<dyn PageSource<ManagedCluster>> = Arc::new(StaticPages::new(vec![
            vec![cluster("rg-a", "aks-1")],
            vec![cluster("rg-b", "aks-2")],
        ]));
        let node_pools: Arc<dyn NodePoolSource> = Arc::new(
            |scope: &ClusterScope| -> anyhow::Result<Arc<dyn PageSource<AgentPool>>> {
                let pools = vec![
                    pool(&format!("{}-system", scope.cluster_name)),
                    pool(&format!("{}-user", scope.cluster_name)),
                ];
                Ok(Arc::new(StaticPages::single(pools)))
            },
        );
        let options = empty_options()
            .with_clusters_factory(fixed_client(clusters))
            .with_node_pools_factory(fixed_client(node_pools));

        let scrapper = Scrapper::new(credential(), "0000", options).unwrap();
        let sink = Arc::new(CollectingSink::new());
        scrapper.run_with_node_pools(sink.clone()).await.unwrap();

        let pools: Vec<_> = sink
            .records()
            .into_iter()
            .filter(|r| r.kind == ResourceKind::NodePools)
            .map(|r| r.resource["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(pools, vec!["aks-1-system", "aks-1-user", "aks-2-system", "aks-2-user"]);
        assert_eq!(sink.counts()[&ResourceKind::ManagedClusters], 2);
    }

    #[tokio::test]
    async fn test_node_pool_source_failure_is_initialization_error() {
        let node_pools: Arc<dyn NodePoolSource> = Arc::new(
            |_: &ClusterScope| -> anyhow::Result<Arc<dyn PageSource<AgentPool>>> {
                Err(anyhow::anyhow!("no such cluster"))
            },
        );
        let options = empty_options().with_node_pools_factory(fixed_client(node_pools));
        let scrapper = Scrapper::new(credential(), "0000", options).unwrap();

        let err = scrapper
            .list_node_pools(&ScrapeContext::default(), &ClusterScope::new("rg", "aks"), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::Initialization {
                kind: ResourceKind::NodePools,
                ..
            }
        ));
    }
}
