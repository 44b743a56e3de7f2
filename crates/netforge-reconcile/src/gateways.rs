//! Internet and NAT gateway reconcilers
//!
//! The internet gateway is a singleton per network. NAT gateways are
//! created one per public subnet, but only when a private subnet exists
//! to route through them; each is backed by an elastic IP allocation,
//! reusing a free owned one before allocating fresh.

use crate::ensure::{ensure_tags, ignore_not_found};
use crate::error::{ReconcileError, Result};
use crate::NetworkReconciler;
use netforge_cloud::types::NatGatewayState;
use netforge_cloud::{CloudError, NetworkCloud, retry_with_backoff};
use netforge_core::{NetworkSpec, NetworkStatus, OWNED, TagParams, Tags, cluster_tag_key};
use std::collections::HashMap;

impl<C: NetworkCloud> NetworkReconciler<C> {
    pub(crate) async fn reconcile_internet_gateway(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let unmanaged = status.is_unmanaged();
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Err(ReconcileError::Config(
                "network must be reconciled before gateways".to_string(),
            ));
        };

        let gateways = self.cloud.describe_internet_gateways(&network_id).await?;
        match gateways.into_iter().next() {
            Some(gateway) => {
                if !unmanaged {
                    let want = self.gateway_tags(spec, format!("{}-igw", self.cluster.name));
                    ensure_tags(&self.cloud, &self.backoff, &gateway.id, &gateway.tags, &want)
                        .await?;
                }
                status.internet_gateway_id = Some(gateway.id);
            }
            None if unmanaged => {
                return Err(ReconcileError::Config(format!(
                    "unmanaged network {network_id} has no internet gateway attached"
                )));
            }
            None => {
                tracing::info!(network = %network_id, "creating internet gateway");
                let gateway = self.cloud.create_internet_gateway().await?;
                let want = self.gateway_tags(spec, format!("{}-igw", self.cluster.name));
                ensure_tags(&self.cloud, &self.backoff, &gateway.id, &gateway.tags, &want).await?;
                self.cloud
                    .attach_internet_gateway(&gateway.id, &network_id)
                    .await?;
                status.internet_gateway_id = Some(gateway.id);
            }
        }
        Ok(())
    }

    /// Ensure a NAT gateway per public subnet, returning the working set
    /// keyed by subnet ID for the route reconciler.
    pub(crate) async fn reconcile_nat_gateways(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<HashMap<String, String>> {
        let unmanaged = status.is_unmanaged();
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Err(ReconcileError::Config(
                "network must be reconciled before gateways".to_string(),
            ));
        };

        let existing: HashMap<String, netforge_cloud::NatGateway> = self
            .cloud
            .describe_nat_gateways(&network_id)
            .await?
            .into_iter()
            .filter(|g| g.is_active())
            .map(|g| (g.subnet_id.clone(), g))
            .collect();
        let mut by_subnet: HashMap<String, String> = existing
            .iter()
            .map(|(subnet, g)| (subnet.clone(), g.id.clone()))
            .collect();

        if !unmanaged && status.private_subnets().next().is_some() {
            let public: Vec<String> = status
                .public_subnets()
                .filter_map(|s| s.id.clone())
                .collect();
            if public.is_empty() {
                return Err(ReconcileError::Config(
                    "no public subnet available for NAT gateway placement".to_string(),
                ));
            }

            for subnet_id in &public {
                if let Some(gateway) = existing.get(subnet_id) {
                    if gateway.tags.has_owned(&self.cluster.name) {
                        let want = self.gateway_tags(spec, format!("{}-nat", self.cluster.name));
                        ensure_tags(&self.cloud, &self.backoff, &gateway.id, &gateway.tags, &want)
                            .await?;
                    }
                    continue;
                }

                let allocation_id = self.get_or_allocate_address(spec).await?;
                tracing::info!(subnet = %subnet_id, "creating NAT gateway");
                let gateway = self
                    .cloud
                    .create_nat_gateway(subnet_id, &allocation_id)
                    .await?;
                let want = self.gateway_tags(spec, format!("{}-nat", self.cluster.name));
                ensure_tags(&self.cloud, &self.backoff, &gateway.id, &gateway.tags, &want).await?;

                // NAT gateways take minutes to come up; don't hand a
                // transitioning gateway to the route reconciler.
                let id = gateway.id.clone();
                retry_with_backoff(&self.wait, CloudError::is_retryable, || async {
                    let gateways = self.cloud.describe_nat_gateways(&network_id).await?;
                    match gateways.into_iter().find(|g| g.id == id) {
                        Some(g) if g.state == NatGatewayState::Available => Ok(()),
                        Some(_) => Err(CloudError::not_ready("nat-gateway", id.clone(), "available")),
                        None => Err(CloudError::not_found("nat-gateway", id.clone())),
                    }
                })
                .await?;

                by_subnet.insert(subnet_id.clone(), id);
            }
        }

        // Derived field: a public subnet records its resident gateway.
        for subnet in status.subnets.iter_mut() {
            subnet.nat_gateway_id = subnet
                .id
                .as_ref()
                .and_then(|id| by_subnet.get(id).cloned());
        }
        Ok(by_subnet)
    }

    /// Reuse a free owned elastic IP or allocate (and tag) a new one.
    async fn get_or_allocate_address(&self, spec: &NetworkSpec) -> Result<String> {
        let key = cluster_tag_key(&self.cluster.name);
        let addresses = self.cloud.describe_addresses_tagged(&key, OWNED).await?;
        if let Some(free) = addresses.into_iter().find(|a| a.association_id.is_none()) {
            tracing::debug!(allocation = %free.allocation_id, "reusing free elastic IP");
            return Ok(free.allocation_id);
        }

        let address = self.cloud.allocate_address().await?;
        let want = self.gateway_tags(spec, format!("{}-eip-nat", self.cluster.name));
        ensure_tags(
            &self.cloud,
            &self.backoff,
            &address.allocation_id,
            &address.tags,
            &want,
        )
        .await?;
        Ok(address.allocation_id)
    }

    /// Delete owned NAT gateways, wait them out, and release the
    /// cluster's elastic IPs.
    pub(crate) async fn delete_nat_gateways(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Ok(());
        };

        let mine: Vec<netforge_cloud::NatGateway> = self
            .cloud
            .describe_nat_gateways(&network_id)
            .await?
            .into_iter()
            .filter(|g| g.is_active() && g.tags.has_owned(&self.cluster.name))
            .collect();

        for gateway in &mine {
            match self.cloud.delete_nat_gateway(&gateway.id).await {
                Ok(()) => tracing::info!(gateway = %gateway.id, "NAT gateway deletion requested"),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        // Subnets can't go while a NAT gateway still sits in them.
        for gateway in &mine {
            let id = gateway.id.clone();
            retry_with_backoff(&self.wait, CloudError::is_retryable, || async {
                let gateways = self.cloud.describe_nat_gateways(&network_id).await?;
                match gateways.into_iter().find(|g| g.id == id) {
                    None => Ok(()),
                    Some(g) if g.state == NatGatewayState::Deleted => Ok(()),
                    Some(_) => Err(CloudError::not_ready("nat-gateway", id.clone(), "deleted")),
                }
            })
            .await?;
        }

        let key = cluster_tag_key(&self.cluster.name);
        for address in self.cloud.describe_addresses_tagged(&key, OWNED).await? {
            match self.cloud.release_address(&address.allocation_id).await {
                Ok(()) => tracing::info!(allocation = %address.allocation_id, "elastic IP released"),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        for subnet in status.subnets.iter_mut() {
            subnet.nat_gateway_id = None;
        }
        Ok(())
    }

    /// Detach and delete owned internet gateways.
    pub(crate) async fn delete_internet_gateways(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Ok(());
        };

        for gateway in self.cloud.describe_internet_gateways(&network_id).await? {
            if !gateway.tags.has_owned(&self.cluster.name) {
                continue;
            }
            ignore_not_found(
                self.cloud
                    .detach_internet_gateway(&gateway.id, &network_id)
                    .await,
            )?;
            ignore_not_found(self.cloud.delete_internet_gateway(&gateway.id).await)?;
            tracing::info!(gateway = %gateway.id, "internet gateway deleted");
        }

        status.internet_gateway_id = None;
        Ok(())
    }

    fn gateway_tags(&self, spec: &NetworkSpec, name: String) -> Tags {
        TagParams {
            cluster: &self.cluster.name,
            name,
            role: "common",
            additional: &spec.additional_tags,
        }
        .build()
    }
}
