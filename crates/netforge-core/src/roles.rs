//! Security group roles
//!
//! Exactly five roles are managed per cluster. The enum is closed on
//! purpose: an unknown role cannot be represented, so it can never be
//! silently ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityGroupRole {
    Bastion,
    ControlPlane,
    ApiServerLoadBalancer,
    Node,
    LoadBalancer,
}

impl SecurityGroupRole {
    /// All managed roles, in reconciliation order.
    pub const ALL: [SecurityGroupRole; 5] = [
        SecurityGroupRole::Bastion,
        SecurityGroupRole::ControlPlane,
        SecurityGroupRole::ApiServerLoadBalancer,
        SecurityGroupRole::Node,
        SecurityGroupRole::LoadBalancer,
    ];

    /// Short role name, used in group names and role tags.
    pub fn suffix(&self) -> &'static str {
        match self {
            SecurityGroupRole::Bastion => "bastion",
            SecurityGroupRole::ControlPlane => "controlplane",
            SecurityGroupRole::ApiServerLoadBalancer => "apiserver-lb",
            SecurityGroupRole::Node => "node",
            SecurityGroupRole::LoadBalancer => "lb",
        }
    }

    /// Canonical security group name for this role in a cluster.
    pub fn group_name(&self, cluster: &str) -> String {
        format!("{cluster}-{}", self.suffix())
    }
}

impl fmt::Display for SecurityGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}
