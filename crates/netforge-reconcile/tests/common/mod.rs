//! In-memory cloud for driving the engine in tests.
//!
//! Behaves like the real thing where the engine can tell the difference:
//! networks get a main route table with a local route, gateways must be
//! detached before deletion, security groups can't go while another
//! group references them, and "does not exist" surfaces as
//! `CloudError::NotFound`. Every mutating call bumps a counter so tests
//! can assert that a pass issued no mutations at all.

use async_trait::async_trait;
use netforge_cloud::types::{
    Address, InternetGateway, NatGateway, NatGatewayState, Network, Route, RouteTable,
    RouteTableAssociation, RouteTarget, SecurityGroup, Subnet,
};
use netforge_cloud::{CloudError, NetworkCloud, Result};
use netforge_core::{IngressRule, Tags};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
    mutations: AtomicUsize,
}

#[derive(Default)]
struct State {
    counter: u32,
    zones: Vec<String>,
    networks: BTreeMap<String, Network>,
    subnets: BTreeMap<String, Subnet>,
    internet_gateways: BTreeMap<String, InternetGateway>,
    addresses: BTreeMap<String, Address>,
    nat_gateways: BTreeMap<String, NatGateway>,
    route_tables: BTreeMap<String, RouteTable>,
    security_groups: BTreeMap<String, SecurityGroup>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}-{:04}", self.counter)
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().zones = vec![
            "us-east-1a".to_string(),
            "us-east-1b".to_string(),
            "us-east-1c".to_string(),
        ];
        fake
    }

    /// Mutating calls issued so far.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Forget mutations issued while seeding a scenario.
    #[allow(dead_code)]
    pub fn reset_mutations(&self) {
        self.mutations.store(0, Ordering::SeqCst)
    }

    fn mutate(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkCloud for FakeCloud {
    async fn availability_zones(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().zones.clone())
    }

    async fn describe_network(&self, network_id: &str) -> Result<Option<Network>> {
        Ok(self.state.lock().unwrap().networks.get(network_id).cloned())
    }

    async fn describe_networks_tagged(&self, key: &str, value: &str) -> Result<Vec<Network>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .networks
            .values()
            .filter(|n| n.tags.get(key) == Some(value))
            .cloned()
            .collect())
    }

    async fn create_network(&self, cidr_block: &str, request_ipv6: bool) -> Result<Network> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("vpc");
        let network = Network {
            id: id.clone(),
            cidr_block: cidr_block.to_string(),
            ipv6_cidr_block: request_ipv6.then(|| "2600:1f16:0:1::/56".to_string()),
            is_available: true,
            tags: Tags::new(),
        };
        state.networks.insert(id.clone(), network.clone());

        // Every network comes with a main route table and a local route.
        let table_id = state.next_id("rtb");
        let association_id = state.next_id("rtbassoc");
        state.route_tables.insert(
            table_id.clone(),
            RouteTable {
                id: table_id,
                network_id: id,
                routes: vec![Route {
                    destination: cidr_block.to_string(),
                    target: RouteTarget::Other("local".to_string()),
                }],
                associations: vec![RouteTableAssociation {
                    id: association_id,
                    subnet_id: None,
                    is_main: true,
                }],
                tags: Tags::new(),
            },
        );
        Ok(network)
    }

    async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if state.networks.remove(network_id).is_none() {
            return Err(CloudError::not_found("network", network_id));
        }
        state.route_tables.retain(|_, t| t.network_id != network_id);
        Ok(())
    }

    async fn describe_subnets(&self, network_id: &str) -> Result<Vec<Subnet>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subnets
            .values()
            .filter(|s| s.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn create_subnet(
        &self,
        network_id: &str,
        cidr_block: &str,
        availability_zone: &str,
    ) -> Result<Subnet> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.networks.contains_key(network_id) {
            return Err(CloudError::not_found("network", network_id));
        }
        if state
            .subnets
            .values()
            .any(|s| s.network_id == network_id && s.cidr_block == cidr_block)
        {
            return Err(CloudError::api(
                "CreateSubnet",
                cidr_block,
                "InvalidSubnet.Conflict: CIDR overlaps an existing subnet",
            ));
        }
        let id = state.next_id("subnet");
        let subnet = Subnet {
            id: id.clone(),
            network_id: network_id.to_string(),
            cidr_block: cidr_block.to_string(),
            availability_zone: availability_zone.to_string(),
            map_public_ip_on_launch: false,
            is_available: true,
            tags: Tags::new(),
        };
        state.subnets.insert(id, subnet.clone());
        Ok(subnet)
    }

    async fn enable_public_ips_on_launch(&self, subnet_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.subnets.get_mut(subnet_id) {
            Some(subnet) => {
                subnet.map_public_ip_on_launch = true;
                Ok(())
            }
            None => Err(CloudError::not_found("subnet", subnet_id)),
        }
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.subnets.remove(subnet_id) {
            Some(_) => Ok(()),
            None => Err(CloudError::not_found("subnet", subnet_id)),
        }
    }

    async fn describe_internet_gateways(&self, network_id: &str) -> Result<Vec<InternetGateway>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .internet_gateways
            .values()
            .filter(|g| g.attached_network_id.as_deref() == Some(network_id))
            .cloned()
            .collect())
    }

    async fn create_internet_gateway(&self) -> Result<InternetGateway> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("igw");
        let gateway = InternetGateway {
            id: id.clone(),
            attached_network_id: None,
            tags: Tags::new(),
        };
        state.internet_gateways.insert(id, gateway.clone());
        Ok(gateway)
    }

    async fn attach_internet_gateway(&self, gateway_id: &str, network_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.networks.contains_key(network_id) {
            return Err(CloudError::not_found("network", network_id));
        }
        match state.internet_gateways.get_mut(gateway_id) {
            Some(gateway) => {
                gateway.attached_network_id = Some(network_id.to_string());
                Ok(())
            }
            None => Err(CloudError::not_found("internet-gateway", gateway_id)),
        }
    }

    async fn detach_internet_gateway(&self, gateway_id: &str, _network_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.internet_gateways.get_mut(gateway_id) {
            Some(gateway) => {
                gateway.attached_network_id = None;
                Ok(())
            }
            None => Err(CloudError::not_found("internet-gateway", gateway_id)),
        }
    }

    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.internet_gateways.get(gateway_id) {
            Some(gateway) if gateway.attached_network_id.is_some() => Err(CloudError::api(
                "DeleteInternetGateway",
                gateway_id,
                "DependencyViolation: gateway is still attached",
            )),
            Some(_) => {
                state.internet_gateways.remove(gateway_id);
                Ok(())
            }
            None => Err(CloudError::not_found("internet-gateway", gateway_id)),
        }
    }

    async fn describe_addresses_tagged(&self, key: &str, value: &str) -> Result<Vec<Address>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .addresses
            .values()
            .filter(|a| a.tags.get(key) == Some(value))
            .cloned()
            .collect())
    }

    async fn allocate_address(&self) -> Result<Address> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("eipalloc");
        let address = Address {
            allocation_id: id.clone(),
            association_id: None,
            tags: Tags::new(),
        };
        state.addresses.insert(id, address.clone());
        Ok(address)
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.addresses.remove(allocation_id) {
            Some(_) => Ok(()),
            None => Err(CloudError::not_found("address", allocation_id)),
        }
    }

    async fn describe_nat_gateways(&self, network_id: &str) -> Result<Vec<NatGateway>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nat_gateways
            .values()
            .filter(|g| {
                state
                    .subnets
                    .get(&g.subnet_id)
                    .is_some_and(|s| s.network_id == network_id)
            })
            .cloned()
            .collect())
    }

    async fn create_nat_gateway(&self, subnet_id: &str, allocation_id: &str) -> Result<NatGateway> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.subnets.contains_key(subnet_id) {
            return Err(CloudError::not_found("subnet", subnet_id));
        }
        let association_id = state.next_id("eipassoc");
        match state.addresses.get_mut(allocation_id) {
            Some(address) => address.association_id = Some(association_id),
            None => return Err(CloudError::not_found("address", allocation_id)),
        }
        let id = state.next_id("nat");
        let gateway = NatGateway {
            id: id.clone(),
            subnet_id: subnet_id.to_string(),
            state: NatGatewayState::Available,
            allocation_id: Some(allocation_id.to_string()),
            tags: Tags::new(),
        };
        state.nat_gateways.insert(id, gateway.clone());
        Ok(gateway)
    }

    async fn delete_nat_gateway(&self, gateway_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let allocation_id = match state.nat_gateways.get_mut(gateway_id) {
            Some(gateway) => {
                gateway.state = NatGatewayState::Deleted;
                gateway.allocation_id.clone()
            }
            None => return Err(CloudError::not_found("nat-gateway", gateway_id)),
        };
        if let Some(allocation_id) = allocation_id {
            if let Some(address) = state.addresses.get_mut(&allocation_id) {
                address.association_id = None;
            }
        }
        Ok(())
    }

    async fn describe_route_tables(&self, network_id: &str) -> Result<Vec<RouteTable>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .route_tables
            .values()
            .filter(|t| t.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn create_route_table(&self, network_id: &str) -> Result<RouteTable> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.networks.contains_key(network_id) {
            return Err(CloudError::not_found("network", network_id));
        }
        let id = state.next_id("rtb");
        let table = RouteTable {
            id: id.clone(),
            network_id: network_id.to_string(),
            routes: Vec::new(),
            associations: Vec::new(),
            tags: Tags::new(),
        };
        state.route_tables.insert(id, table.clone());
        Ok(table)
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.route_tables.get_mut(route_table_id) {
            Some(table) => {
                if table.routes.iter().any(|r| r.destination == destination) {
                    return Err(CloudError::api(
                        "CreateRoute",
                        route_table_id,
                        "RouteAlreadyExists: destination already routed",
                    ));
                }
                table.routes.push(Route {
                    destination: destination.to_string(),
                    target: target.clone(),
                });
                Ok(())
            }
            None => Err(CloudError::not_found("route-table", route_table_id)),
        }
    }

    async fn replace_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let table = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| CloudError::not_found("route-table", route_table_id))?;
        match table.routes.iter_mut().find(|r| r.destination == destination) {
            Some(route) => {
                route.target = target.clone();
                Ok(())
            }
            None => Err(CloudError::not_found("route", destination)),
        }
    }

    async fn associate_route_table(&self, route_table_id: &str, subnet_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.subnets.contains_key(subnet_id) {
            return Err(CloudError::not_found("subnet", subnet_id));
        }
        let association_id = state.next_id("rtbassoc");
        match state.route_tables.get_mut(route_table_id) {
            Some(table) => {
                table.associations.push(RouteTableAssociation {
                    id: association_id,
                    subnet_id: Some(subnet_id.to_string()),
                    is_main: false,
                });
                Ok(())
            }
            None => Err(CloudError::not_found("route-table", route_table_id)),
        }
    }

    async fn disassociate_route_table(&self, association_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        for table in state.route_tables.values_mut() {
            if let Some(index) = table.associations.iter().position(|a| a.id == association_id) {
                table.associations.remove(index);
                return Ok(());
            }
        }
        Err(CloudError::not_found("route-table", association_id))
    }

    async fn delete_route_table(&self, route_table_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        match state.route_tables.get(route_table_id) {
            Some(table) if table.associations.iter().any(|a| !a.is_main) => Err(CloudError::api(
                "DeleteRouteTable",
                route_table_id,
                "DependencyViolation: table still has associations",
            )),
            Some(_) => {
                state.route_tables.remove(route_table_id);
                Ok(())
            }
            None => Err(CloudError::not_found("route-table", route_table_id)),
        }
    }

    async fn describe_security_groups(&self, network_id: &str) -> Result<Vec<SecurityGroup>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .security_groups
            .values()
            .filter(|g| g.network_id == network_id)
            .cloned()
            .collect())
    }

    async fn describe_security_group(&self, group_id: &str) -> Result<Option<SecurityGroup>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .security_groups
            .get(group_id)
            .cloned())
    }

    async fn create_security_group(
        &self,
        network_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String> {
        let _ = description;
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.networks.contains_key(network_id) {
            return Err(CloudError::not_found("network", network_id));
        }
        if state
            .security_groups
            .values()
            .any(|g| g.network_id == network_id && g.name == name)
        {
            return Err(CloudError::api(
                "CreateSecurityGroup",
                name,
                "InvalidGroup.Duplicate: name already in use",
            ));
        }
        let id = state.next_id("sg");
        state.security_groups.insert(
            id.clone(),
            SecurityGroup {
                id: id.clone(),
                name: name.to_string(),
                network_id: network_id.to_string(),
                ingress_rules: Vec::new(),
                tags: Tags::new(),
            },
        );
        Ok(id)
    }

    async fn authorize_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let group = state
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| CloudError::not_found("security-group", group_id))?;
        for rule in rules {
            if group.ingress_rules.contains(rule) {
                return Err(CloudError::api(
                    "AuthorizeSecurityGroupIngress",
                    group_id,
                    "InvalidPermission.Duplicate: rule already authorized",
                ));
            }
            group.ingress_rules.push(rule.clone());
        }
        Ok(())
    }

    async fn revoke_ingress(&self, group_id: &str, rules: &[IngressRule]) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        let group = state
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| CloudError::not_found("security-group", group_id))?;
        for rule in rules {
            match group.ingress_rules.iter().position(|r| r == rule) {
                Some(index) => {
                    group.ingress_rules.remove(index);
                }
                None => return Err(CloudError::not_found("ingress-rule", group_id)),
            }
        }
        Ok(())
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if !state.security_groups.contains_key(group_id) {
            return Err(CloudError::not_found("security-group", group_id));
        }
        let referenced = state.security_groups.values().any(|g| {
            g.id != group_id
                && g.ingress_rules
                    .iter()
                    .any(|r| r.source_security_group_ids.contains(group_id))
        });
        if referenced {
            return Err(CloudError::api(
                "DeleteSecurityGroup",
                group_id,
                "DependencyViolation: group is referenced by another group",
            ));
        }
        state.security_groups.remove(group_id);
        Ok(())
    }

    async fn create_tags(&self, resource_id: &str, tags: &Tags) -> Result<()> {
        self.mutate();
        let mut state = self.state.lock().unwrap();
        if let Some(resource) = state.networks.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.subnets.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.internet_gateways.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.addresses.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.nat_gateways.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.route_tables.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        if let Some(resource) = state.security_groups.get_mut(resource_id) {
            resource.tags.merge(tags);
            return Ok(());
        }
        Err(CloudError::not_found("resource", resource_id))
    }
}
