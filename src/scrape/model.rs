//! Resource records and scopes
//!
//! Records keep their identity fields typed and carry every other ARM field in
//! a flattened `extra` map, so writing them back out is lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The kinds of resources the scrapper can list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    ResourceGroups,
    Providers,
    VirtualNetworks,
    DiskEncryptionSets,
    ManagedClusters,
    NodePools,
}

impl ResourceKind {
    /// Kinds listed by the concurrent top-level run, in spawn order
    pub const TOP_LEVEL: [ResourceKind; 5] = [
        ResourceKind::ResourceGroups,
        ResourceKind::Providers,
        ResourceKind::VirtualNetworks,
        ResourceKind::DiskEncryptionSets,
        ResourceKind::ManagedClusters,
    ];

    /// Human readable name used in logs and errors
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroups => "resource groups",
            ResourceKind::Providers => "providers",
            ResourceKind::VirtualNetworks => "virtual networks",
            ResourceKind::DiskEncryptionSets => "disk encryption sets",
            ResourceKind::ManagedClusters => "managed clusters",
            ResourceKind::NodePools => "node pools",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Scope for subscription-wide listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionScope {
    pub subscription_id: String,
}

impl SubscriptionScope {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }
}

/// Scope for listing the node pools of one managed cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterScope {
    pub resource_group: String,
    pub cluster_name: String,
}

impl ClusterScope {
    pub fn new(resource_group: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            cluster_name: cluster_name.into(),
        }
    }
}

/// Resource group record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resource provider registration record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(
        default,
        rename = "registrationState",
        skip_serializing_if = "Option::is_none"
    )]
    pub registration_state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Virtual network record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Disk encryption set record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskEncryptionSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// AKS managed cluster record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedCluster {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManagedCluster {
    /// Node-pool scope for this cluster, derived from its ARM id.
    /// Returns `None` when the id or name is missing or malformed.
    pub fn cluster_scope(&self) -> Option<ClusterScope> {
        let name = self.name.as_deref()?;
        let resource_group = resource_group_from_id(self.id.as_deref()?)?;
        Some(ClusterScope::new(resource_group, name))
    }
}

/// AKS agent (node) pool record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Extract the resource group segment from an ARM resource id
/// e.g., "/subscriptions/s/resourceGroups/rg-1/providers/..." -> "rg-1"
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_group_from_id() {
        assert_eq!(
            resource_group_from_id(
                "/subscriptions/0000/resourceGroups/rg-prod/providers/Microsoft.ContainerService/managedClusters/aks"
            ),
            Some("rg-prod".to_string())
        );
        assert_eq!(
            resource_group_from_id("/subscriptions/0000/resourcegroups/MC_rg"),
            Some("MC_rg".to_string())
        );
        assert_eq!(resource_group_from_id("/subscriptions/0000"), None);
        assert_eq!(resource_group_from_id("/subscriptions/0000/resourceGroups"), None);
    }

    #[test]
    fn test_cluster_scope_from_record() {
        let cluster: ManagedCluster = serde_json::from_value(json!({
            "id": "/subscriptions/0000/resourceGroups/rg-aks/providers/Microsoft.ContainerService/managedClusters/aks-1",
            "name": "aks-1",
            "location": "westeurope",
            "properties": {"kubernetesVersion": "1.29.2"}
        }))
        .unwrap();

        assert_eq!(
            cluster.cluster_scope(),
            Some(ClusterScope::new("rg-aks", "aks-1"))
        );
        assert!(ManagedCluster::default().cluster_scope().is_none());
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let raw = json!({
            "id": "/subscriptions/0000/resourceGroups/rg",
            "name": "rg",
            "location": "eastus",
            "tags": {"env": "prod"},
            "properties": {"provisioningState": "Succeeded"}
        });
        let group: ResourceGroup = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(group.name.as_deref(), Some("rg"));
        assert_eq!(serde_json::to_value(&group).unwrap(), raw);
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        assert_eq!(
            serde_json::to_value(ResourceKind::DiskEncryptionSets).unwrap(),
            json!("diskEncryptionSets")
        );
        assert_eq!(ResourceKind::NodePools.to_string(), "node pools");
        assert!(!ResourceKind::TOP_LEVEL.contains(&ResourceKind::NodePools));
    }
}
