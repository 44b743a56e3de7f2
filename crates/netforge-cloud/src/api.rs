//! Cloud provider trait definition

use crate::error::Result;
use crate::types::{
    Address, InternetGateway, NatGateway, Network, RouteTable, RouteTarget, SecurityGroup, Subnet,
};
use async_trait::async_trait;
use netforge_core::{IngressRule, Tags};

/// Network API surface consumed by the reconcilers.
///
/// One method per cloud primitive, describe/create/delete per resource
/// kind. Any SDK exposing equivalent calls can implement this trait; the
/// engine never talks to a cloud SDK directly. Implementations translate
/// their native errors into [`crate::CloudError`], in particular mapping
/// "does not exist" responses to `CloudError::NotFound` so the retry
/// harness and idempotent teardown can classify them.
#[async_trait]
pub trait NetworkCloud: Send + Sync {
    /// Zone names of the region, in the provider's order. The first entry
    /// is where the default topology is placed.
    async fn availability_zones(&self) -> Result<Vec<String>>;

    // Virtual networks

    async fn describe_network(&self, network_id: &str) -> Result<Option<Network>>;

    /// Networks carrying the given tag, for ownership-based discovery.
    async fn describe_networks_tagged(&self, key: &str, value: &str) -> Result<Vec<Network>>;

    async fn create_network(&self, cidr_block: &str, request_ipv6: bool) -> Result<Network>;

    async fn delete_network(&self, network_id: &str) -> Result<()>;

    // Subnets

    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>>;

    async fn create_subnet(
        &self,
        network_id: &str,
        cidr_block: &str,
        availability_zone: &str,
    ) -> Result<Subnet>;

    /// Enable auto-assignment of public IPs on launch (public subnets).
    async fn enable_public_ips_on_launch(&self, subnet_id: &str) -> Result<()>;

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()>;

    // Internet gateways

    /// Gateways attached to the given network.
    async fn describe_internet_gateways(&self, network_id: &str) -> Result<Vec<InternetGateway>>;

    async fn create_internet_gateway(&self) -> Result<InternetGateway>;

    async fn attach_internet_gateway(&self, gateway_id: &str, network_id: &str) -> Result<()>;

    async fn detach_internet_gateway(&self, gateway_id: &str, network_id: &str) -> Result<()>;

    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<()>;

    // Elastic addresses

    /// Allocations carrying the given tag.
    async fn describe_addresses_tagged(&self, key: &str, value: &str) -> Result<Vec<Address>>;

    async fn allocate_address(&self) -> Result<Address>;

    async fn release_address(&self, allocation_id: &str) -> Result<()>;

    // NAT gateways

    /// All NAT gateways in the network, whatever their state. Callers
    /// filter on [`NatGateway::is_active`].
    async fn describe_nat_gateways(&self, network_id: &str) -> Result<Vec<NatGateway>>;

    async fn create_nat_gateway(&self, subnet_id: &str, allocation_id: &str) -> Result<NatGateway>;

    async fn delete_nat_gateway(&self, gateway_id: &str) -> Result<()>;

    // Route tables

    async fn describe_route_tables(&self, network_id: &str) -> Result<Vec<RouteTable>>;

    async fn create_route_table(&self, network_id: &str) -> Result<RouteTable>;

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()>;

    /// Replace an existing route in place, keeping its destination.
    async fn replace_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()>;

    async fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> Result<()>;

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()>;

    async fn delete_route_table(&self, route_table_id: &str) -> Result<()>;

    // Security groups

    async fn describe_security_groups(&self, network_id: &str) -> Result<Vec<SecurityGroup>>;

    async fn describe_security_group(&self, group_id: &str) -> Result<Option<SecurityGroup>>;

    /// Returns the new group's ID.
    async fn create_security_group(
        &self,
        network_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String>;

    /// Authorize all `rules` in one bulk call.
    async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()>;

    /// Revoke all `rules` in one bulk call.
    async fn revoke_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()>;

    async fn delete_security_group(&self, group_id: &str) -> Result<()>;

    // Tags

    /// Create or overwrite tags on a resource. Subject to read-after-write
    /// inconsistency right after the resource is created, so callers wrap
    /// this in the retry harness.
    async fn create_tags(&self, resource_id: &str, tags: &Tags) -> Result<()>;
}
