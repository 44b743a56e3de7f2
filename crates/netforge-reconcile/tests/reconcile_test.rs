mod common;

use common::FakeCloud;
use netforge_cloud::{NetworkCloud, RouteTarget};
use netforge_core::{NetworkSpec, NetworkStatus, SecurityGroupRole, SubnetSpec};
use netforge_reconcile::{ClusterConfig, NetworkReconciler, ReconcileError};

fn reconciler() -> NetworkReconciler<FakeCloud> {
    NetworkReconciler::new(FakeCloud::new(), ClusterConfig::new("test"))
}

#[tokio::test]
async fn test_end_to_end_default_topology() {
    let reconciler = reconciler();
    let spec = NetworkSpec::default();
    let mut status = NetworkStatus::default();

    reconciler.reconcile(&spec, &mut status).await.unwrap();

    let network = status.network.clone().unwrap();
    assert_eq!(network.cidr_block, "10.0.0.0/16");
    assert!(network.ownership.is_owned());

    // Exactly one private and one public subnet, same zone, the two
    // default CIDR blocks.
    let private: Vec<SubnetSpec> = status.private_subnets().cloned().collect();
    let public: Vec<SubnetSpec> = status.public_subnets().cloned().collect();
    assert_eq!(private.len(), 1);
    assert_eq!(public.len(), 1);
    assert_eq!(private[0].cidr_block, "10.0.0.0/24");
    assert_eq!(public[0].cidr_block, "10.0.1.0/24");
    assert_eq!(private[0].availability_zone, "us-east-1a");
    assert_eq!(public[0].availability_zone, "us-east-1a");

    // Internet gateway attached, NAT gateway resident in the public
    // subnet.
    let igw_id = status.internet_gateway_id.clone().unwrap();
    let nat_id = public[0].nat_gateway_id.clone().unwrap();
    assert!(private[0].nat_gateway_id.is_none());

    // Each subnet has its own route table with the right default route.
    let tables = reconciler
        .cloud()
        .describe_route_tables(&network.id)
        .await
        .unwrap();
    let private_table = tables
        .iter()
        .find(|t| Some(t.id.as_str()) == private[0].route_table_id.as_deref())
        .unwrap();
    let public_table = tables
        .iter()
        .find(|t| Some(t.id.as_str()) == public[0].route_table_id.as_deref())
        .unwrap();
    assert_ne!(private_table.id, public_table.id);
    assert_eq!(
        private_table.default_route().unwrap().target,
        RouteTarget::NatGateway(nat_id)
    );
    assert_eq!(
        public_table.default_route().unwrap().target,
        RouteTarget::InternetGateway(igw_id)
    );

    // The public subnet auto-assigns public IPs.
    let subnets = reconciler.cloud().describe_subnets(&network.id).await.unwrap();
    let public_observed = subnets
        .iter()
        .find(|s| Some(s.id.as_str()) == public[0].id.as_deref())
        .unwrap();
    assert!(public_observed.map_public_ip_on_launch);

    // Five security groups, tagged and carrying their role defaults.
    assert_eq!(status.security_groups.len(), 5);
    let bastion = &status.security_groups[&SecurityGroupRole::Bastion];
    assert_eq!(bastion.name, "test-bastion");
    assert!(bastion.tags.has_owned("test"));
    assert_eq!(bastion.ingress_rules.len(), 1);
    assert_eq!(bastion.ingress_rules[0].from_port, 22);
    assert!(bastion.ingress_rules[0].cidr_blocks.contains("0.0.0.0/0"));

    let api_lb = &status.security_groups[&SecurityGroupRole::ApiServerLoadBalancer];
    assert_eq!(api_lb.ingress_rules.len(), 1);
    assert_eq!(api_lb.ingress_rules[0].from_port, 6443);

    let control_plane = &status.security_groups[&SecurityGroupRole::ControlPlane];
    assert!(
        control_plane
            .ingress_rules
            .iter()
            .any(|r| r.from_port == 2379 && r.to_port == 2379)
    );
    let api_rule = control_plane
        .ingress_rules
        .iter()
        .find(|r| r.from_port == 6443)
        .unwrap();
    assert_eq!(api_rule.source_security_group_ids.len(), 3);

    let node = &status.security_groups[&SecurityGroupRole::Node];
    assert!(
        node.ingress_rules
            .iter()
            .any(|r| r.from_port == 30000 && r.to_port == 32767)
    );

    // Rule ownership of the load balancer group is someone else's.
    let lb = &status.security_groups[&SecurityGroupRole::LoadBalancer];
    assert!(lb.ingress_rules.is_empty());
    assert!(lb.tags.contains_key("kubernetes.io/cluster/test"));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let reconciler = reconciler();
    let spec = NetworkSpec::default();
    let mut status = NetworkStatus::default();

    reconciler.reconcile(&spec, &mut status).await.unwrap();
    let first_pass = status.clone();

    reconciler.cloud().reset_mutations();
    reconciler.reconcile(&spec, &mut status).await.unwrap();

    assert_eq!(
        reconciler.cloud().mutations(),
        0,
        "second pass must issue no mutating calls"
    );
    assert_eq!(status.network, first_pass.network);
    assert_eq!(status.internet_gateway_id, first_pass.internet_gateway_id);
    assert_eq!(status.security_groups, first_pass.security_groups);
    assert_eq!(status.subnets.len(), first_pass.subnets.len());
}

#[tokio::test]
async fn test_reconcile_resumes_after_partial_failure() {
    // A pass that failed half-way (network and subnets exist, nothing
    // else) is picked up without double-creating anything.
    let reconciler = reconciler();
    let spec = NetworkSpec::default();
    let mut status = NetworkStatus::default();

    reconciler.reconcile(&spec, &mut status).await.unwrap();
    let network_id = status.network_id().unwrap().to_string();

    // Simulate the caller retrying with a stale status.
    let mut retried = NetworkStatus::default();
    reconciler.cloud().reset_mutations();
    reconciler.reconcile(&spec, &mut retried).await.unwrap();

    assert_eq!(reconciler.cloud().mutations(), 0);
    assert_eq!(retried.network_id(), Some(network_id.as_str()));
    assert_eq!(retried.subnets.len(), 2);
}

#[tokio::test]
async fn test_private_subnet_requires_nat_in_its_zone() {
    let reconciler = reconciler();
    let mut spec = NetworkSpec::default();
    // Public subnet (and therefore the NAT gateway) in 1b, private
    // subnet in 1a: no silent cross-zone route.
    spec.subnets = vec![
        SubnetSpec::new("10.0.0.0/24", "us-east-1a", false),
        SubnetSpec::new("10.0.1.0/24", "us-east-1b", true),
    ];
    let mut status = NetworkStatus::default();

    let err = reconciler.reconcile(&spec, &mut status).await.unwrap_err();
    match err {
        ReconcileError::NoNatGatewayInZone { zone } => assert_eq!(zone, "us-east-1a"),
        other => panic!("expected NoNatGatewayInZone, got: {other}"),
    }
}

#[tokio::test]
async fn test_caller_topology_is_respected() {
    let reconciler = reconciler();
    let mut spec = NetworkSpec::default();
    spec.subnets = vec![
        SubnetSpec::new("10.0.10.0/24", "us-east-1b", false),
        SubnetSpec::new("10.0.11.0/24", "us-east-1b", true),
        SubnetSpec::new("10.0.12.0/24", "us-east-1c", true),
    ];
    let mut status = NetworkStatus::default();

    reconciler.reconcile(&spec, &mut status).await.unwrap();

    assert_eq!(status.subnets.len(), 3);
    assert_eq!(status.public_subnets().count(), 2);
    // No default topology was synthesized on top.
    assert!(status.subnets.iter().all(|s| s.cidr_block.starts_with("10.0.1")));
}
