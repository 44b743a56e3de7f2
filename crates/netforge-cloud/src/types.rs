//! Observed cloud resources
//!
//! These are the shapes discovery returns: a normalized, backend-neutral
//! view of what actually exists in the account. They carry only the
//! fields the reconcilers consume.

use netforge_core::{IngressRule, Tags};
use serde::{Deserialize, Serialize};

/// A virtual network as observed in the cloud account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub cidr_block: String,
    pub ipv6_cidr_block: Option<String>,
    /// Networks start in a transitional state after creation.
    pub is_available: bool,
    pub tags: Tags,
}

/// A subnet as observed in the cloud account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub network_id: String,
    pub cidr_block: String,
    pub availability_zone: String,
    /// Whether instances launched here get a public IP by default.
    pub map_public_ip_on_launch: bool,
    pub is_available: bool,
    pub tags: Tags,
}

/// An internet gateway, possibly attached to a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetGateway {
    pub id: String,
    pub attached_network_id: Option<String>,
    pub tags: Tags,
}

/// An elastic IP allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub allocation_id: String,
    /// Present while the address is bound to a NAT gateway or instance.
    pub association_id: Option<String>,
    pub tags: Tags,
}

/// A NAT gateway placed in a (public) subnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatGateway {
    pub id: String,
    pub subnet_id: String,
    pub state: NatGatewayState,
    pub allocation_id: Option<String>,
    pub tags: Tags,
}

impl NatGateway {
    /// Gateways on their way out don't count as existing for discovery.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            NatGatewayState::Pending | NatGatewayState::Available
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NatGatewayState {
    Pending,
    Available,
    Deleting,
    Deleted,
    Failed,
}

/// A route table and its subnet associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: String,
    pub network_id: String,
    pub routes: Vec<Route>,
    pub associations: Vec<RouteTableAssociation>,
    pub tags: Tags,
}

impl RouteTable {
    /// The network's main table applies to subnets without an explicit
    /// association.
    pub fn is_main(&self) -> bool {
        self.associations.iter().any(|a| a.is_main)
    }

    pub fn is_associated_with(&self, subnet_id: &str) -> bool {
        self.associations
            .iter()
            .any(|a| a.subnet_id.as_deref() == Some(subnet_id))
    }

    /// The default (catch-all) IPv4 route, if any.
    pub fn default_route(&self) -> Option<&Route> {
        self.routes.iter().find(|r| r.destination == "0.0.0.0/0")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Destination CIDR block.
    pub destination: String,
    pub target: RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    InternetGateway(String),
    NatGateway(String),
    /// Any other target kind (peering, instance, local). Carried so a
    /// stale default route is recognized whatever it points at.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    pub id: String,
    /// Absent on the main association.
    pub subnet_id: Option<String>,
    pub is_main: bool,
}

/// A security group and its current inbound permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub ingress_rules: Vec<IngressRule>,
    pub tags: Tags,
}
