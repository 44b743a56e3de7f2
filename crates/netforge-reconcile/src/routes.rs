//! Route table reconciler
//!
//! Every subnet ends up with a default route: public subnets through the
//! internet gateway, private subnets through a NAT gateway in the same
//! availability zone. Routing a private subnet through another zone's
//! NAT gateway is never done silently; the pass fails instead.

use crate::ensure::{ensure_tags, ignore_not_found};
use crate::error::{ReconcileError, Result};
use crate::NetworkReconciler;
use netforge_cloud::{NetworkCloud, RouteTable, RouteTarget};
use netforge_core::{NetworkSpec, NetworkStatus, TagParams, Tags};
use std::collections::HashMap;

const DEFAULT_ROUTE: &str = "0.0.0.0/0";

impl<C: NetworkCloud> NetworkReconciler<C> {
    pub(crate) async fn reconcile_route_tables(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
        nat_by_subnet: &HashMap<String, String>,
    ) -> Result<()> {
        let unmanaged = status.is_unmanaged();
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Err(ReconcileError::Config(
                "network must be reconciled before route tables".to_string(),
            ));
        };

        let tables = self.cloud.describe_route_tables(&network_id).await?;

        if unmanaged {
            // Discovery only: record which table serves each subnet.
            for subnet in status.subnets.iter_mut() {
                let Some(subnet_id) = subnet.id.clone() else {
                    continue;
                };
                subnet.route_table_id =
                    route_table_for_subnet(&tables, &subnet_id).map(|t| t.id.clone());
            }
            return Ok(());
        }

        // NAT gateways by zone, for private subnet placement.
        let nat_by_zone: HashMap<String, String> = status
            .subnets
            .iter()
            .filter_map(|s| {
                let id = s.id.as_deref()?;
                let nat = nat_by_subnet.get(id)?;
                Some((s.availability_zone.clone(), nat.clone()))
            })
            .collect();
        let igw_id = status.internet_gateway_id.clone();

        for subnet in status.subnets.iter_mut() {
            let Some(subnet_id) = subnet.id.clone() else {
                continue;
            };

            let target = if subnet.is_public {
                let igw = igw_id.as_deref().ok_or_else(|| {
                    ReconcileError::Config(
                        "internet gateway required for public subnet routing".to_string(),
                    )
                })?;
                RouteTarget::InternetGateway(igw.to_string())
            } else {
                let nat = nat_by_zone.get(&subnet.availability_zone).ok_or_else(|| {
                    ReconcileError::NoNatGatewayInZone {
                        zone: subnet.availability_zone.clone(),
                    }
                })?;
                RouteTarget::NatGateway(nat.clone())
            };

            match tables.iter().find(|t| t.is_associated_with(&subnet_id)) {
                Some(table) => {
                    self.ensure_default_route(table, &target).await?;
                    if table.tags.has_owned(&self.cluster.name) {
                        let want = self.route_table_tags(
                            spec,
                            subnet.is_public,
                            &subnet.availability_zone,
                        );
                        ensure_tags(&self.cloud, &self.backoff, &table.id, &table.tags, &want)
                            .await?;
                    }
                    subnet.route_table_id = Some(table.id.clone());
                }
                None => {
                    tracing::info!(subnet = %subnet_id, "creating route table");
                    let table = self.cloud.create_route_table(&network_id).await?;
                    let want =
                        self.route_table_tags(spec, subnet.is_public, &subnet.availability_zone);
                    ensure_tags(&self.cloud, &self.backoff, &table.id, &table.tags, &want).await?;
                    // Route before associating, so the subnet never sees
                    // a table without its default route.
                    self.cloud
                        .create_route(&table.id, DEFAULT_ROUTE, &target)
                        .await?;
                    self.cloud
                        .associate_route_table(&table.id, &subnet_id)
                        .await?;
                    subnet.route_table_id = Some(table.id);
                }
            }
        }
        Ok(())
    }

    /// Create the default route, or replace it in place when it points at
    /// the wrong gateway.
    async fn ensure_default_route(&self, table: &RouteTable, want: &RouteTarget) -> Result<()> {
        match table.default_route() {
            Some(route) if route.target == *want => Ok(()),
            Some(_) => {
                tracing::info!(table = %table.id, "replacing stale default route");
                self.cloud
                    .replace_route(&table.id, DEFAULT_ROUTE, want)
                    .await?;
                Ok(())
            }
            None => {
                self.cloud
                    .create_route(&table.id, DEFAULT_ROUTE, want)
                    .await?;
                Ok(())
            }
        }
    }

    /// Delete owned route tables, dropping their subnet associations
    /// first.
    pub(crate) async fn delete_route_tables(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Ok(());
        };

        for table in self.cloud.describe_route_tables(&network_id).await? {
            if !table.tags.has_owned(&self.cluster.name) {
                continue;
            }
            for association in table.associations.iter().filter(|a| !a.is_main) {
                ignore_not_found(self.cloud.disassociate_route_table(&association.id).await)?;
            }
            match self.cloud.delete_route_table(&table.id).await {
                Ok(()) => tracing::info!(table = %table.id, "route table deleted"),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        for subnet in status.subnets.iter_mut() {
            subnet.route_table_id = None;
        }
        Ok(())
    }

    fn route_table_tags(&self, spec: &NetworkSpec, is_public: bool, zone: &str) -> Tags {
        let role = if is_public { "public" } else { "private" };
        TagParams {
            cluster: &self.cluster.name,
            name: format!("{}-rt-{role}-{zone}", self.cluster.name),
            role,
            additional: &spec.additional_tags,
        }
        .build()
    }
}

/// The table serving a subnet: its explicit association if one exists,
/// the network's main table otherwise. An explicit association always
/// wins, even when a main table also exists.
fn route_table_for_subnet<'a>(tables: &'a [RouteTable], subnet_id: &str) -> Option<&'a RouteTable> {
    tables
        .iter()
        .find(|t| t.is_associated_with(subnet_id))
        .or_else(|| tables.iter().find(|t| t.is_main()))
}
