//! EC2 implementation of the cloud boundary

use crate::convert::{
    address_from_ec2, internet_gateway_from_ec2, nat_gateway_from_ec2, network_from_vpc,
    permission_from_rule, route_table_from_ec2, security_group_from_ec2, subnet_from_ec2,
    tags_to_ec2,
};
use crate::error::translate;
use async_trait::async_trait;
use aws_sdk_ec2::types::{AttributeBooleanValue, DomainType, Filter};
use netforge_cloud::types::{
    Address, InternetGateway, NatGateway, Network, RouteTable, RouteTarget, SecurityGroup, Subnet,
};
use netforge_cloud::{CloudError, NetworkCloud, Result};
use netforge_core::{IngressRule, Tags};

/// [`NetworkCloud`] backed by `aws-sdk-ec2`.
///
/// The wrapped SDK client is an `Arc` internally, so `AwsCloud` is cheap
/// to clone and share across reconcilers.
#[derive(Clone)]
pub struct AwsCloud {
    client: aws_sdk_ec2::Client,
}

impl AwsCloud {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }

    pub fn from_client(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

fn vpc_filter(network_id: &str) -> Filter {
    Filter::builder().name("vpc-id").values(network_id).build()
}

#[async_trait]
impl NetworkCloud for AwsCloud {
    async fn availability_zones(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_availability_zones()
            .send()
            .await
            .map_err(|e| translate("DescribeAvailabilityZones", "zone", "-", e))?;
        Ok(output
            .availability_zones
            .unwrap_or_default()
            .into_iter()
            .filter_map(|zone| zone.zone_name)
            .collect())
    }

    async fn describe_network(&self, network_id: &str) -> Result<Option<Network>> {
        let output = match self.client.describe_vpcs().vpc_ids(network_id).send().await {
            Ok(output) => output,
            Err(err) => {
                let err = translate("DescribeVpcs", "network", network_id, err);
                return if err.is_not_found() { Ok(None) } else { Err(err) };
            }
        };
        Ok(output
            .vpcs
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(network_from_vpc))
    }

    async fn describe_networks_tagged(&self, key: &str, value: &str) -> Result<Vec<Network>> {
        let output = self
            .client
            .describe_vpcs()
            .filters(Filter::builder().name(format!("tag:{key}")).values(value).build())
            .send()
            .await
            .map_err(|e| translate("DescribeVpcs", "network", key, e))?;
        Ok(output
            .vpcs
            .unwrap_or_default()
            .into_iter()
            .map(network_from_vpc)
            .collect())
    }

    async fn create_network(&self, cidr_block: &str, request_ipv6: bool) -> Result<Network> {
        let mut request = self.client.create_vpc().cidr_block(cidr_block);
        if request_ipv6 {
            request = request.amazon_provided_ipv6_cidr_block(true);
        }
        let output = request
            .send()
            .await
            .map_err(|e| translate("CreateVpc", "network", cidr_block, e))?;
        let vpc = output.vpc.ok_or_else(|| {
            CloudError::api("CreateVpc", cidr_block, "response contained no network")
        })?;
        Ok(network_from_vpc(vpc))
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.client
            .delete_vpc()
            .vpc_id(network_id)
            .send()
            .await
            .map_err(|e| translate("DeleteVpc", "network", network_id, e))?;
        Ok(())
    }

    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>> {
        let output = self
            .client
            .describe_subnets()
            .filters(vpc_filter(network_id))
            .send()
            .await
            .map_err(|e| translate("DescribeSubnets", "network", network_id, e))?;
        Ok(output
            .subnets
            .unwrap_or_default()
            .into_iter()
            .map(subnet_from_ec2)
            .collect())
    }

    async fn create_subnet(
        &self,
        network_id: &str,
        cidr_block: &str,
        availability_zone: &str,
    ) -> Result<Subnet> {
        let output = self
            .client
            .create_subnet()
            .vpc_id(network_id)
            .cidr_block(cidr_block)
            .availability_zone(availability_zone)
            .send()
            .await
            .map_err(|e| translate("CreateSubnet", "subnet", cidr_block, e))?;
        let subnet = output.subnet.ok_or_else(|| {
            CloudError::api("CreateSubnet", cidr_block, "response contained no subnet")
        })?;
        Ok(subnet_from_ec2(subnet))
    }

    async fn enable_public_ips_on_launch(&self, subnet_id: &str) -> Result<()> {
        self.client
            .modify_subnet_attribute()
            .subnet_id(subnet_id)
            .map_public_ip_on_launch(AttributeBooleanValue::builder().value(true).build())
            .send()
            .await
            .map_err(|e| translate("ModifySubnetAttribute", "subnet", subnet_id, e))?;
        Ok(())
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.client
            .delete_subnet()
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| translate("DeleteSubnet", "subnet", subnet_id, e))?;
        Ok(())
    }

    async fn describe_internet_gateways(&self, network_id: &str) -> Result<Vec<InternetGateway>> {
        let output = self
            .client
            .describe_internet_gateways()
            .filters(
                Filter::builder()
                    .name("attachment.vpc-id")
                    .values(network_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| translate("DescribeInternetGateways", "network", network_id, e))?;
        Ok(output
            .internet_gateways
            .unwrap_or_default()
            .into_iter()
            .map(internet_gateway_from_ec2)
            .collect())
    }

    async fn create_internet_gateway(&self) -> Result<InternetGateway> {
        let output = self
            .client
            .create_internet_gateway()
            .send()
            .await
            .map_err(|e| translate("CreateInternetGateway", "internet-gateway", "-", e))?;
        let gateway = output.internet_gateway.ok_or_else(|| {
            CloudError::api(
                "CreateInternetGateway",
                "-",
                "response contained no internet gateway",
            )
        })?;
        Ok(internet_gateway_from_ec2(gateway))
    }

    async fn attach_internet_gateway(&self, gateway_id: &str, network_id: &str) -> Result<()> {
        self.client
            .attach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(network_id)
            .send()
            .await
            .map_err(|e| translate("AttachInternetGateway", "internet-gateway", gateway_id, e))?;
        Ok(())
    }

    async fn detach_internet_gateway(&self, gateway_id: &str, network_id: &str) -> Result<()> {
        self.client
            .detach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(network_id)
            .send()
            .await
            .map_err(|e| translate("DetachInternetGateway", "internet-gateway", gateway_id, e))?;
        Ok(())
    }

    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<()> {
        self.client
            .delete_internet_gateway()
            .internet_gateway_id(gateway_id)
            .send()
            .await
            .map_err(|e| translate("DeleteInternetGateway", "internet-gateway", gateway_id, e))?;
        Ok(())
    }

    async fn describe_addresses_tagged(&self, key: &str, value: &str) -> Result<Vec<Address>> {
        let output = self
            .client
            .describe_addresses()
            .filters(Filter::builder().name(format!("tag:{key}")).values(value).build())
            .send()
            .await
            .map_err(|e| translate("DescribeAddresses", "address", key, e))?;
        Ok(output
            .addresses
            .unwrap_or_default()
            .into_iter()
            .map(address_from_ec2)
            .collect())
    }

    async fn allocate_address(&self) -> Result<Address> {
        let output = self
            .client
            .allocate_address()
            .domain(DomainType::Vpc)
            .send()
            .await
            .map_err(|e| translate("AllocateAddress", "address", "-", e))?;
        Ok(Address {
            allocation_id: output.allocation_id.unwrap_or_default(),
            association_id: None,
            tags: Tags::new(),
        })
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        self.client
            .release_address()
            .allocation_id(allocation_id)
            .send()
            .await
            .map_err(|e| translate("ReleaseAddress", "address", allocation_id, e))?;
        Ok(())
    }

    async fn describe_nat_gateways(&self, network_id: &str) -> Result<Vec<NatGateway>> {
        let output = self
            .client
            .describe_nat_gateways()
            .filter(vpc_filter(network_id))
            .send()
            .await
            .map_err(|e| translate("DescribeNatGateways", "network", network_id, e))?;
        Ok(output
            .nat_gateways
            .unwrap_or_default()
            .into_iter()
            .map(nat_gateway_from_ec2)
            .collect())
    }

    async fn create_nat_gateway(&self, subnet_id: &str, allocation_id: &str) -> Result<NatGateway> {
        let output = self
            .client
            .create_nat_gateway()
            .subnet_id(subnet_id)
            .allocation_id(allocation_id)
            .send()
            .await
            .map_err(|e| translate("CreateNatGateway", "nat-gateway", subnet_id, e))?;
        let gateway = output.nat_gateway.ok_or_else(|| {
            CloudError::api(
                "CreateNatGateway",
                subnet_id,
                "response contained no NAT gateway",
            )
        })?;
        Ok(nat_gateway_from_ec2(gateway))
    }

    async fn delete_nat_gateway(&self, gateway_id: &str) -> Result<()> {
        self.client
            .delete_nat_gateway()
            .nat_gateway_id(gateway_id)
            .send()
            .await
            .map_err(|e| translate("DeleteNatGateway", "nat-gateway", gateway_id, e))?;
        Ok(())
    }

    async fn describe_route_tables(&self, network_id: &str) -> Result<Vec<RouteTable>> {
        let output = self
            .client
            .describe_route_tables()
            .filters(vpc_filter(network_id))
            .send()
            .await
            .map_err(|e| translate("DescribeRouteTables", "network", network_id, e))?;
        Ok(output
            .route_tables
            .unwrap_or_default()
            .into_iter()
            .map(route_table_from_ec2)
            .collect())
    }

    async fn create_route_table(&self, network_id: &str) -> Result<RouteTable> {
        let output = self
            .client
            .create_route_table()
            .vpc_id(network_id)
            .send()
            .await
            .map_err(|e| translate("CreateRouteTable", "route-table", network_id, e))?;
        let table = output.route_table.ok_or_else(|| {
            CloudError::api(
                "CreateRouteTable",
                network_id,
                "response contained no route table",
            )
        })?;
        Ok(route_table_from_ec2(table))
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        let request = self
            .client
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination);
        let request = match target {
            RouteTarget::NatGateway(id) => request.nat_gateway_id(id),
            RouteTarget::InternetGateway(id) | RouteTarget::Other(id) => request.gateway_id(id),
        };
        request
            .send()
            .await
            .map_err(|e| translate("CreateRoute", "route-table", route_table_id, e))?;
        Ok(())
    }

    async fn replace_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        let request = self
            .client
            .replace_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination);
        let request = match target {
            RouteTarget::NatGateway(id) => request.nat_gateway_id(id),
            RouteTarget::InternetGateway(id) | RouteTarget::Other(id) => request.gateway_id(id),
        };
        request
            .send()
            .await
            .map_err(|e| translate("ReplaceRoute", "route-table", route_table_id, e))?;
        Ok(())
    }

    async fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> Result<()> {
        self.client
            .associate_route_table()
            .route_table_id(route_table_id)
            .subnet_id(subnet_id)
            .send()
            .await
            .map_err(|e| translate("AssociateRouteTable", "route-table", route_table_id, e))?;
        Ok(())
    }

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()> {
        self.client
            .disassociate_route_table()
            .association_id(association_id)
            .send()
            .await
            .map_err(|e| translate("DisassociateRouteTable", "route-table", association_id, e))?;
        Ok(())
    }

    async fn delete_route_table(&self, route_table_id: &str) -> Result<()> {
        self.client
            .delete_route_table()
            .route_table_id(route_table_id)
            .send()
            .await
            .map_err(|e| translate("DeleteRouteTable", "route-table", route_table_id, e))?;
        Ok(())
    }

    async fn describe_security_groups(&self, network_id: &str) -> Result<Vec<SecurityGroup>> {
        let output = self
            .client
            .describe_security_groups()
            .filters(vpc_filter(network_id))
            .send()
            .await
            .map_err(|e| translate("DescribeSecurityGroups", "network", network_id, e))?;
        Ok(output
            .security_groups
            .unwrap_or_default()
            .into_iter()
            .map(security_group_from_ec2)
            .collect())
    }

    async fn describe_security_group(&self, group_id: &str) -> Result<Option<SecurityGroup>> {
        let output = match self
            .client
            .describe_security_groups()
            .group_ids(group_id)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let err = translate("DescribeSecurityGroups", "security-group", group_id, err);
                return if err.is_not_found() { Ok(None) } else { Err(err) };
            }
        };
        Ok(output
            .security_groups
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(security_group_from_ec2))
    }

    async fn create_security_group(
        &self,
        network_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String> {
        let output = self
            .client
            .create_security_group()
            .vpc_id(network_id)
            .group_name(name)
            .description(description)
            .send()
            .await
            .map_err(|e| translate("CreateSecurityGroup", "security-group", name, e))?;
        output.group_id.ok_or_else(|| {
            CloudError::api("CreateSecurityGroup", name, "response contained no group id")
        })
    }

    async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()> {
        self.client
            .authorize_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(rules.iter().map(permission_from_rule).collect()))
            .send()
            .await
            .map_err(|e| {
                translate(
                    "AuthorizeSecurityGroupIngress",
                    "security-group",
                    group_id,
                    e,
                )
            })?;
        Ok(())
    }

    async fn revoke_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()> {
        self.client
            .revoke_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(rules.iter().map(permission_from_rule).collect()))
            .send()
            .await
            .map_err(|e| translate("RevokeSecurityGroupIngress", "security-group", group_id, e))?;
        Ok(())
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.client
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| translate("DeleteSecurityGroup", "security-group", group_id, e))?;
        Ok(())
    }

    async fn create_tags(&self, resource_id: &str, tags: &Tags) -> Result<()> {
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(tags_to_ec2(tags)))
            .send()
            .await
            .map_err(|e| translate("CreateTags", "resource", resource_id, e))?;
        Ok(())
    }
}
