//! Desired and observed network topology
//!
//! `NetworkSpec` is supplied fresh by the caller on every reconciliation
//! pass and never mutated here. `NetworkStatus` persists across passes:
//! the caller reads it in, the engine rewrites it from live discovery,
//! and the caller stores it back.

use crate::roles::SecurityGroupRole;
use crate::rules::IngressRule;
use crate::tags::{ResourceOwnership, Tags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Network CIDR used when the caller does not specify one.
pub const DEFAULT_NETWORK_CIDR: &str = "10.0.0.0/16";

/// Desired state of a cluster's network infrastructure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub network: NetworkConfig,

    /// Requested subnets. Empty means "synthesize the default topology".
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,

    /// Pre-existing security groups to use instead of managed ones.
    /// Either empty or covering every role.
    #[serde(default)]
    pub security_group_overrides: BTreeMap<SecurityGroupRole, String>,

    /// Extra ingress rules for the CNI, applied between the control-plane
    /// and node roles.
    #[serde(default)]
    pub ingress_cni_rules: Vec<IngressRule>,

    /// Caller tags applied to every owned resource.
    #[serde(default)]
    pub additional_tags: Tags,
}

impl NetworkSpec {
    /// Bring-your-own mode: the caller supplied the network, nothing in
    /// it is created, mutated, or deleted by the engine.
    pub fn is_unmanaged(&self) -> bool {
        self.network.id.is_some()
    }
}

/// Desired virtual network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// ID of a pre-existing network. Presence switches the whole
    /// reconciliation into unmanaged mode.
    pub id: Option<String>,

    /// IPv4 CIDR block of the network.
    pub cidr_block: String,

    /// Request a provider-assigned IPv6 block on creation.
    #[serde(default)]
    pub enable_ipv6: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: None,
            cidr_block: DEFAULT_NETWORK_CIDR.to_string(),
            enable_ipv6: false,
        }
    }
}

/// A single subnet, desired or resolved.
///
/// Until a subnet has an ID it is identified by `(network, cidr_block)`;
/// afterwards the ID wins. `route_table_id` and `nat_gateway_id` are
/// derived from live discovery and rewritten on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub id: Option<String>,
    pub cidr_block: String,
    pub availability_zone: String,
    pub is_public: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_gateway_id: Option<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl SubnetSpec {
    pub fn new(
        cidr_block: impl Into<String>,
        availability_zone: impl Into<String>,
        is_public: bool,
    ) -> Self {
        Self {
            id: None,
            cidr_block: cidr_block.into(),
            availability_zone: availability_zone.into(),
            is_public,
            route_table_id: None,
            nat_gateway_id: None,
            tags: Tags::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Observed and owned state, rewritten by the engine on every pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub network: Option<NetworkState>,

    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_gateway_id: Option<String>,

    #[serde(default)]
    pub security_groups: BTreeMap<SecurityGroupRole, SecurityGroupStatus>,
}

impl NetworkStatus {
    pub fn network_id(&self) -> Option<&str> {
        self.network.as_ref().map(|n| n.id.as_str())
    }

    pub fn is_unmanaged(&self) -> bool {
        self.network
            .as_ref()
            .is_some_and(|n| n.ownership.is_unmanaged())
    }

    pub fn public_subnets(&self) -> impl Iterator<Item = &SubnetSpec> {
        self.subnets.iter().filter(|s| s.is_public)
    }

    pub fn private_subnets(&self) -> impl Iterator<Item = &SubnetSpec> {
        self.subnets.iter().filter(|s| !s.is_public)
    }

    pub fn security_group_id(&self, role: SecurityGroupRole) -> Option<&str> {
        self.security_groups.get(&role).map(|sg| sg.id.as_str())
    }
}

/// Resolved virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub id: String,
    pub cidr_block: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_cidr_block: Option<String>,

    pub ownership: ResourceOwnership,
}

/// Resolved security group for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupStatus {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub ingress_rules: Vec<IngressRule>,

    #[serde(default)]
    pub tags: Tags,

    pub ownership: ResourceOwnership,
}
