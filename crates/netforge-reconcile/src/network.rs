//! Virtual network reconciler

use crate::ensure::ensure_tags;
use crate::error::{ReconcileError, Result};
use crate::NetworkReconciler;
use netforge_cloud::{CloudError, NetworkCloud, retry_with_backoff};
use netforge_core::{
    NetworkSpec, NetworkState, NetworkStatus, OWNED, ResourceOwnership, TagParams, cluster_tag_key,
};

impl<C: NetworkCloud> NetworkReconciler<C> {
    /// Resolve the cluster's virtual network: adopt the caller's in
    /// unmanaged mode, otherwise discover the owned one or create it.
    pub(crate) async fn reconcile_network(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        if let Some(id) = &spec.network.id {
            // Bring-your-own network: discover attributes, never mutate.
            let network = self.cloud.describe_network(id).await?.ok_or_else(|| {
                ReconcileError::Config(format!("unmanaged network {id} does not exist"))
            })?;
            tracing::debug!(network = %network.id, cidr = %network.cidr_block, "using unmanaged network");
            status.network = Some(NetworkState {
                id: network.id,
                cidr_block: network.cidr_block,
                ipv6_cidr_block: network.ipv6_cidr_block,
                ownership: ResourceOwnership::Unmanaged,
            });
            return Ok(());
        }

        let key = cluster_tag_key(&self.cluster.name);
        let mut owned = self.cloud.describe_networks_tagged(&key, OWNED).await?;
        if owned.len() > 1 {
            return Err(ReconcileError::Config(format!(
                "found {} networks owned by cluster {}, expected at most one",
                owned.len(),
                self.cluster.name
            )));
        }

        let network = match owned.pop() {
            Some(existing) => existing,
            None => {
                tracing::info!(cidr = %spec.network.cidr_block, "creating network");
                let created = self
                    .cloud
                    .create_network(&spec.network.cidr_block, spec.network.enable_ipv6)
                    .await?;
                let id = created.id.clone();
                // Fresh networks report a transitional state for a bit.
                retry_with_backoff(&self.wait, CloudError::is_retryable, || async {
                    match self.cloud.describe_network(&id).await? {
                        Some(n) if n.is_available => Ok(n),
                        Some(_) => Err(CloudError::not_ready("network", id.clone(), "available")),
                        None => Err(CloudError::not_found("network", id.clone())),
                    }
                })
                .await?
            }
        };

        let want = TagParams {
            cluster: &self.cluster.name,
            name: format!("{}-vpc", self.cluster.name),
            role: "common",
            additional: &spec.additional_tags,
        }
        .build();
        ensure_tags(&self.cloud, &self.backoff, &network.id, &network.tags, &want).await?;

        status.network = Some(NetworkState {
            id: network.id,
            cidr_block: network.cidr_block,
            ipv6_cidr_block: network.ipv6_cidr_block,
            ownership: ResourceOwnership::Owned,
        });
        Ok(())
    }

    /// Delete the owned network. Runs last in teardown, after everything
    /// inside the network is gone.
    pub(crate) async fn delete_network(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(state) = &status.network else {
            return Ok(());
        };
        if !state.ownership.is_owned() {
            tracing::debug!(network = %state.id, "network not owned, leaving in place");
            status.network = None;
            return Ok(());
        }

        match self.cloud.delete_network(&state.id).await {
            Ok(()) => tracing::info!(network = %state.id, "network deleted"),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        status.network = None;
        Ok(())
    }
}
