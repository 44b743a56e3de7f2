//! Subnet reconciler
//!
//! Matches observed subnets against the requested topology (by ID first,
//! then by CIDR), creates what is missing, and mirrors what exists but
//! was never requested. When the caller specifies no topology at all, a
//! minimal default of one private and one public subnet is synthesized
//! in the first availability zone.

use crate::ensure::ensure_tags;
use crate::error::{ReconcileError, Result};
use crate::NetworkReconciler;
use ipnetwork::Ipv4Network;
use netforge_cloud::{CloudError, NetworkCloud, RouteTable, RouteTarget, retry_with_backoff};
use netforge_cloud::types::Subnet;
use netforge_core::{NetworkSpec, NetworkStatus, ROLE_TAG, SubnetSpec, TagParams, Tags};
use std::net::Ipv4Addr;

impl<C: NetworkCloud> NetworkReconciler<C> {
    pub(crate) async fn reconcile_subnets(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let unmanaged = status.is_unmanaged();
        let (network_id, network_cidr) = match &status.network {
            Some(network) => (network.id.clone(), network.cidr_block.clone()),
            None => {
                return Err(ReconcileError::Config(
                    "network must be reconciled before subnets".to_string(),
                ));
            }
        };

        let observed = self.cloud.describe_subnets(&network_id).await?;
        let route_tables = self.cloud.describe_route_tables(&network_id).await?;

        let mut subnets: Vec<SubnetSpec> = spec.subnets.clone();

        if !unmanaged && subnets.len() < 2 && observed.len() < 2 {
            let zones = self.cloud.availability_zones().await?;
            let zone = zones.first().ok_or_else(|| {
                ReconcileError::Config("no availability zone available".to_string())
            })?;
            let (private, public) = default_topology(&network_cidr)?;
            tracing::info!(%zone, %private, %public, "no subnet topology specified, using defaults");
            subnets = vec![
                SubnetSpec::new(private.to_string(), zone.clone(), false),
                SubnetSpec::new(public.to_string(), zone.clone(), true),
            ];
        }

        // Match observed subnets into the requested list.
        for existing in &observed {
            let classified_public = is_public_subnet(existing, &route_tables);
            let matched = subnets
                .iter()
                .position(|s| s.id.as_deref() == Some(existing.id.as_str()))
                .or_else(|| {
                    subnets
                        .iter()
                        .position(|s| s.id.is_none() && s.cidr_block == existing.cidr_block)
                });

            match matched {
                Some(index) => {
                    let entry = &mut subnets[index];
                    entry.id = Some(existing.id.clone());
                    entry.cidr_block = existing.cidr_block.clone();
                    entry.availability_zone = existing.availability_zone.clone();
                    if unmanaged {
                        // Discovery only: the live resource is authoritative.
                        entry.is_public = classified_public;
                        entry.tags = existing.tags.clone();
                    } else {
                        let want = self.subnet_tags(spec, entry.is_public, &entry.availability_zone);
                        ensure_tags(&self.cloud, &self.backoff, &existing.id, &existing.tags, &want)
                            .await?;
                        entry.tags = want;
                    }
                }
                None => {
                    // Discovered but unrequested: mirrored, never deleted.
                    tracing::debug!(subnet = %existing.id, "recording unrequested subnet");
                    subnets.push(SubnetSpec {
                        id: Some(existing.id.clone()),
                        cidr_block: existing.cidr_block.clone(),
                        availability_zone: existing.availability_zone.clone(),
                        is_public: classified_public,
                        route_table_id: None,
                        nat_gateway_id: None,
                        tags: existing.tags.clone(),
                    });
                }
            }
        }

        if unmanaged {
            let has_public = subnets.iter().any(|s| s.id.is_some() && s.is_public);
            let has_private = subnets.iter().any(|s| s.id.is_some() && !s.is_public);
            if !has_public || !has_private {
                return Err(ReconcileError::Config(format!(
                    "unmanaged network {network_id} must contain at least one public and one private subnet"
                )));
            }
        } else {
            // Create what the spec asks for and discovery didn't find.
            for entry in subnets.iter_mut().filter(|s| s.id.is_none()) {
                tracing::info!(
                    cidr = %entry.cidr_block,
                    zone = %entry.availability_zone,
                    public = entry.is_public,
                    "creating subnet"
                );
                let created = self
                    .cloud
                    .create_subnet(&network_id, &entry.cidr_block, &entry.availability_zone)
                    .await?;
                let id = created.id.clone();

                retry_with_backoff(&self.wait, CloudError::is_retryable, || async {
                    let subnets = self.cloud.describe_subnets(&network_id).await?;
                    match subnets.into_iter().find(|s| s.id == id) {
                        Some(s) if s.is_available => Ok(()),
                        Some(_) => Err(CloudError::not_ready("subnet", id.clone(), "available")),
                        None => Err(CloudError::not_found("subnet", id.clone())),
                    }
                })
                .await?;

                let want = self.subnet_tags(spec, entry.is_public, &entry.availability_zone);
                ensure_tags(&self.cloud, &self.backoff, &id, &created.tags, &want).await?;

                if entry.is_public {
                    self.cloud.enable_public_ips_on_launch(&id).await?;
                }

                entry.id = Some(id);
                entry.tags = want;
            }
        }

        status.subnets = subnets;
        Ok(())
    }

    /// Delete owned subnets. NAT gateways must already be gone.
    pub(crate) async fn delete_subnets(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Ok(());
        };

        for subnet in self.cloud.describe_subnets(&network_id).await? {
            if !subnet.tags.has_owned(&self.cluster.name) {
                continue;
            }
            match self.cloud.delete_subnet(&subnet.id).await {
                Ok(()) => tracing::info!(subnet = %subnet.id, "subnet deleted"),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        status.subnets.clear();
        Ok(())
    }

    fn subnet_tags(&self, spec: &NetworkSpec, is_public: bool, zone: &str) -> Tags {
        let role = if is_public { "public" } else { "private" };
        TagParams {
            cluster: &self.cluster.name,
            name: format!("{}-subnet-{role}-{zone}", self.cluster.name),
            role,
            additional: &spec.additional_tags,
        }
        .build()
    }
}

/// Whether a subnet routes to the internet.
///
/// An explicit `public` role tag wins outright. Otherwise the subnet is
/// public if its route table carries a default route via an internet
/// gateway; the network's main table only stands in for subnets with no
/// explicit association.
fn is_public_subnet(subnet: &Subnet, route_tables: &[RouteTable]) -> bool {
    if subnet.tags.get(ROLE_TAG) == Some("public") {
        return true;
    }

    let table = route_tables
        .iter()
        .find(|t| t.is_associated_with(&subnet.id))
        .or_else(|| route_tables.iter().find(|t| t.is_main()));

    table.is_some_and(|t| {
        t.default_route()
            .is_some_and(|r| matches!(r.target, RouteTarget::InternetGateway(_)))
    })
}

/// Derive the default one-private, one-public topology from the network
/// CIDR: its first two /24 blocks.
fn default_topology(network_cidr: &str) -> Result<(Ipv4Network, Ipv4Network)> {
    let network: Ipv4Network = network_cidr.parse().map_err(|_| {
        ReconcileError::Config(format!("invalid network CIDR block {network_cidr}"))
    })?;
    if network.prefix() > 23 {
        return Err(ReconcileError::Config(format!(
            "network {network_cidr} is too small for the default subnet topology"
        )));
    }

    let base = u32::from(network.network());
    let private = Ipv4Network::new(Ipv4Addr::from(base), 24)
        .map_err(|e| ReconcileError::Config(e.to_string()))?;
    let public = Ipv4Network::new(Ipv4Addr::from(base + 256), 24)
        .map_err(|e| ReconcileError::Config(e.to_string()))?;
    Ok((private, public))
}
