//! EC2 <-> model type conversions

use aws_sdk_ec2::types as ec2;
use netforge_cloud::types::{
    Address, InternetGateway, NatGateway, NatGatewayState, Network, Route, RouteTable,
    RouteTableAssociation, RouteTarget, SecurityGroup, Subnet,
};
use netforge_core::{IngressRule, Protocol, Tags};

pub(crate) fn tags_from_ec2(tags: Option<Vec<ec2::Tag>>) -> Tags {
    tags.unwrap_or_default()
        .into_iter()
        .filter_map(|tag| Some((tag.key?, tag.value?)))
        .collect()
}

pub(crate) fn tags_to_ec2(tags: &Tags) -> Vec<ec2::Tag> {
    tags.iter()
        .map(|(key, value)| ec2::Tag::builder().key(key).value(value).build())
        .collect()
}

pub(crate) fn network_from_vpc(vpc: ec2::Vpc) -> Network {
    Network {
        id: vpc.vpc_id.unwrap_or_default(),
        cidr_block: vpc.cidr_block.unwrap_or_default(),
        ipv6_cidr_block: vpc
            .ipv6_cidr_block_association_set
            .unwrap_or_default()
            .into_iter()
            .find_map(|association| association.ipv6_cidr_block),
        is_available: vpc.state == Some(ec2::VpcState::Available),
        tags: tags_from_ec2(vpc.tags),
    }
}

pub(crate) fn subnet_from_ec2(subnet: ec2::Subnet) -> Subnet {
    Subnet {
        id: subnet.subnet_id.unwrap_or_default(),
        network_id: subnet.vpc_id.unwrap_or_default(),
        cidr_block: subnet.cidr_block.unwrap_or_default(),
        availability_zone: subnet.availability_zone.unwrap_or_default(),
        map_public_ip_on_launch: subnet.map_public_ip_on_launch.unwrap_or(false),
        is_available: subnet.state == Some(ec2::SubnetState::Available),
        tags: tags_from_ec2(subnet.tags),
    }
}

pub(crate) fn internet_gateway_from_ec2(gateway: ec2::InternetGateway) -> InternetGateway {
    InternetGateway {
        id: gateway.internet_gateway_id.unwrap_or_default(),
        attached_network_id: gateway
            .attachments
            .unwrap_or_default()
            .into_iter()
            .find_map(|attachment| attachment.vpc_id),
        tags: tags_from_ec2(gateway.tags),
    }
}

pub(crate) fn address_from_ec2(address: ec2::Address) -> Address {
    Address {
        allocation_id: address.allocation_id.unwrap_or_default(),
        association_id: address.association_id,
        tags: tags_from_ec2(address.tags),
    }
}

pub(crate) fn nat_gateway_from_ec2(gateway: ec2::NatGateway) -> NatGateway {
    NatGateway {
        id: gateway.nat_gateway_id.unwrap_or_default(),
        subnet_id: gateway.subnet_id.unwrap_or_default(),
        state: nat_gateway_state(gateway.state),
        allocation_id: gateway
            .nat_gateway_addresses
            .unwrap_or_default()
            .into_iter()
            .find_map(|address| address.allocation_id),
        tags: tags_from_ec2(gateway.tags),
    }
}

fn nat_gateway_state(state: Option<ec2::NatGatewayState>) -> NatGatewayState {
    match state {
        Some(ec2::NatGatewayState::Available) => NatGatewayState::Available,
        Some(ec2::NatGatewayState::Deleting) => NatGatewayState::Deleting,
        Some(ec2::NatGatewayState::Deleted) => NatGatewayState::Deleted,
        Some(ec2::NatGatewayState::Failed) => NatGatewayState::Failed,
        _ => NatGatewayState::Pending,
    }
}

pub(crate) fn route_table_from_ec2(table: ec2::RouteTable) -> RouteTable {
    RouteTable {
        id: table.route_table_id.unwrap_or_default(),
        network_id: table.vpc_id.unwrap_or_default(),
        routes: table
            .routes
            .unwrap_or_default()
            .into_iter()
            .filter_map(route_from_ec2)
            .collect(),
        associations: table
            .associations
            .unwrap_or_default()
            .into_iter()
            .filter_map(association_from_ec2)
            .collect(),
        tags: tags_from_ec2(table.tags),
    }
}

fn route_from_ec2(route: ec2::Route) -> Option<Route> {
    let destination = route.destination_cidr_block?;
    let target = if let Some(nat_gateway_id) = route.nat_gateway_id {
        RouteTarget::NatGateway(nat_gateway_id)
    } else if let Some(gateway_id) = route.gateway_id {
        if gateway_id.starts_with("igw-") {
            RouteTarget::InternetGateway(gateway_id)
        } else {
            RouteTarget::Other(gateway_id)
        }
    } else {
        RouteTarget::Other(String::new())
    };
    Some(Route {
        destination,
        target,
    })
}

fn association_from_ec2(
    association: ec2::RouteTableAssociation,
) -> Option<RouteTableAssociation> {
    Some(RouteTableAssociation {
        id: association.route_table_association_id?,
        subnet_id: association.subnet_id,
        is_main: association.main.unwrap_or(false),
    })
}

pub(crate) fn security_group_from_ec2(group: ec2::SecurityGroup) -> SecurityGroup {
    SecurityGroup {
        id: group.group_id.unwrap_or_default(),
        name: group.group_name.unwrap_or_default(),
        network_id: group.vpc_id.unwrap_or_default(),
        ingress_rules: group
            .ip_permissions
            .unwrap_or_default()
            .into_iter()
            .map(rule_from_permission)
            .collect(),
        tags: tags_from_ec2(group.tags),
    }
}

pub(crate) fn rule_from_permission(permission: ec2::IpPermission) -> IngressRule {
    let protocol = Protocol::from_wire(permission.ip_protocol.as_deref().unwrap_or("-1"));
    let mut rule = IngressRule::new(
        protocol,
        permission.from_port.unwrap_or(0),
        permission.to_port.unwrap_or(0),
    );

    for range in permission.ip_ranges.unwrap_or_default() {
        if rule.description.is_empty() {
            if let Some(description) = &range.description {
                rule.description = description.clone();
            }
        }
        if let Some(cidr) = range.cidr_ip {
            rule.cidr_blocks.insert(cidr);
        }
    }
    for pair in permission.user_id_group_pairs.unwrap_or_default() {
        if rule.description.is_empty() {
            if let Some(description) = &pair.description {
                rule.description = description.clone();
            }
        }
        if let Some(group_id) = pair.group_id {
            rule.source_security_group_ids.insert(group_id);
        }
    }
    rule
}

pub(crate) fn permission_from_rule(rule: &IngressRule) -> ec2::IpPermission {
    let mut builder = ec2::IpPermission::builder().ip_protocol(rule.protocol.as_str());
    if rule.protocol.uses_ports() {
        builder = builder.from_port(rule.from_port).to_port(rule.to_port);
    }
    for cidr in &rule.cidr_blocks {
        let mut range = ec2::IpRange::builder().cidr_ip(cidr);
        if !rule.description.is_empty() {
            range = range.description(&rule.description);
        }
        builder = builder.ip_ranges(range.build());
    }
    for group_id in &rule.source_security_group_ids {
        let mut pair = ec2::UserIdGroupPair::builder().group_id(group_id);
        if !rule.description.is_empty() {
            pair = pair.description(&rule.description);
        }
        builder = builder.user_id_group_pairs(pair.build());
    }
    builder.build()
}
