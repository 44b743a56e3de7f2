//! Security group reconciler
//!
//! Two passes per reconciliation: first resolve every role to a concrete
//! group (override, adopted, or freshly created), then converge each
//! owned group's ingress rules onto the role defaults. Groups whose
//! rules belong to someone else (caller overrides, and the load balancer
//! group managed by the in-cluster cloud provider) are resolved but
//! never converged.

use crate::ensure::ensure_tags;
use crate::error::{ReconcileError, Result};
use crate::NetworkReconciler;
use netforge_cloud::NetworkCloud;
use netforge_core::{
    IngressRule, NetworkSpec, NetworkStatus, OWNED, Protocol, ResourceOwnership,
    SecurityGroupRole, SecurityGroupStatus, TagParams, Tags, cloud_provider_tag_key, diff_rules,
};

const ANYWHERE: &str = "0.0.0.0/0";

const SSH_PORT: i32 = 22;
const ETCD_CLIENT_PORT: i32 = 2379;
const ETCD_PEER_PORT: i32 = 2380;
const KUBELET_PORT: i32 = 10250;
const NODE_PORT_FROM: i32 = 30000;
const NODE_PORT_TO: i32 = 32767;

impl<C: NetworkCloud> NetworkReconciler<C> {
    pub(crate) async fn reconcile_security_groups(
        &self,
        spec: &NetworkSpec,
        status: &mut NetworkStatus,
    ) -> Result<()> {
        let unmanaged = status.is_unmanaged();
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Err(ReconcileError::Config(
                "network must be reconciled before security groups".to_string(),
            ));
        };

        let existing = self.cloud.describe_security_groups(&network_id).await?;
        let overrides = &spec.security_group_overrides;

        // Pass 1: existence and identity.
        for role in SecurityGroupRole::ALL {
            let resolved = if let Some(id) = overrides.get(&role) {
                // Caller-supplied group: trusted, never created or tagged.
                let group = self.cloud.describe_security_group(id).await?.ok_or_else(|| {
                    ReconcileError::Config(format!(
                        "override security group {id} for role {role} does not exist"
                    ))
                })?;
                SecurityGroupStatus {
                    id: group.id,
                    name: group.name,
                    ingress_rules: group.ingress_rules,
                    tags: group.tags,
                    ownership: ResourceOwnership::Unmanaged,
                }
            } else {
                let name = role.group_name(&self.cluster.name);
                match existing.iter().find(|g| g.name == name) {
                    Some(group) => {
                        let ownership =
                            ResourceOwnership::from_tags(&self.cluster.name, &group.tags);
                        if !unmanaged {
                            let want = self.security_group_tags(spec, role);
                            ensure_tags(&self.cloud, &self.backoff, &group.id, &group.tags, &want)
                                .await?;
                        }
                        SecurityGroupStatus {
                            id: group.id.clone(),
                            name,
                            ingress_rules: group.ingress_rules.clone(),
                            tags: group.tags.clone(),
                            ownership,
                        }
                    }
                    None if unmanaged => {
                        tracing::debug!(%role, "security group absent in unmanaged network, skipping");
                        continue;
                    }
                    None => {
                        tracing::info!(%role, %name, "creating security group");
                        let id = self
                            .cloud
                            .create_security_group(
                                &network_id,
                                &name,
                                &format!("{role} security group for cluster {}", self.cluster.name),
                            )
                            .await?;
                        let want = self.security_group_tags(spec, role);
                        ensure_tags(&self.cloud, &self.backoff, &id, &Tags::new(), &want).await?;
                        SecurityGroupStatus {
                            id,
                            name,
                            ingress_rules: Vec::new(),
                            ownership: ResourceOwnership::from_tags(&self.cluster.name, &want),
                            tags: want,
                        }
                    }
                }
            };
            status.security_groups.insert(role, resolved);
        }

        if unmanaged {
            // Discovery only; rules are never converged in a network we
            // don't manage.
            return Ok(());
        }

        // Pass 2: ingress convergence, only for groups whose rules this
        // engine owns.
        let mut desired_by_role = Vec::new();
        for (role, group) in &status.security_groups {
            if group.ownership != ResourceOwnership::Owned {
                continue;
            }
            desired_by_role.push((*role, self.role_ingress_rules(*role, spec, status)?));
        }

        for (role, desired) in desired_by_role {
            let Some(group) = status.security_groups.get_mut(&role) else {
                continue;
            };
            let diff = diff_rules(&group.ingress_rules, &desired);
            if !diff.to_revoke.is_empty() {
                tracing::info!(
                    group = %group.id,
                    count = diff.to_revoke.len(),
                    "revoking stale ingress rules"
                );
                self.cloud.revoke_ingress(&group.id, &diff.to_revoke).await?;
            }
            if !diff.to_authorize.is_empty() {
                tracing::info!(
                    group = %group.id,
                    count = diff.to_authorize.len(),
                    "authorizing ingress rules"
                );
                self.cloud
                    .authorize_ingress(&group.id, &diff.to_authorize)
                    .await?;
            }
            group.ingress_rules = desired;
        }
        Ok(())
    }

    /// Delete every cluster-owned security group in the network, tracked
    /// or not. All groups are attempted; failures aggregate.
    pub(crate) async fn delete_security_groups(&self, status: &mut NetworkStatus) -> Result<()> {
        let Some(network_id) = status.network_id().map(str::to_string) else {
            return Ok(());
        };

        let groups: Vec<netforge_cloud::SecurityGroup> = self
            .cloud
            .describe_security_groups(&network_id)
            .await?
            .into_iter()
            .filter(|g| g.tags.has_owned(&self.cluster.name))
            .collect();

        let mut failures: Vec<ReconcileError> = Vec::new();

        // Revoke everything first: rules referencing sibling groups
        // block their deletion.
        for group in &groups {
            if group.ingress_rules.is_empty() {
                continue;
            }
            if let Err(err) = self.cloud.revoke_ingress(&group.id, &group.ingress_rules).await {
                if !err.is_not_found() {
                    failures.push(err.into());
                }
            }
        }

        for group in &groups {
            match self.cloud.delete_security_group(&group.id).await {
                Ok(()) => tracing::info!(group = %group.id, "security group deleted"),
                Err(err) if err.is_not_found() => {}
                Err(err) => failures.push(err.into()),
            }
        }

        if failures.is_empty() {
            status.security_groups.clear();
            Ok(())
        } else {
            Err(ReconcileError::Teardown(failures))
        }
    }

    fn security_group_tags(&self, spec: &NetworkSpec, role: SecurityGroupRole) -> Tags {
        let mut tags = TagParams {
            cluster: &self.cluster.name,
            name: role.group_name(&self.cluster.name),
            role: role.suffix(),
            additional: &spec.additional_tags,
        }
        .build();
        if role == SecurityGroupRole::LoadBalancer {
            // Rule ownership is deferred to the in-cluster cloud provider.
            tags.insert(cloud_provider_tag_key(&self.cluster.name), OWNED);
        }
        tags
    }

    /// Default ingress rule set for one role. Cross-role rules reference
    /// the groups resolved in pass 1.
    fn role_ingress_rules(
        &self,
        role: SecurityGroupRole,
        spec: &NetworkSpec,
        status: &NetworkStatus,
    ) -> Result<Vec<IngressRule>> {
        let group = |role: SecurityGroupRole| -> Result<String> {
            status
                .security_group_id(role)
                .map(str::to_string)
                .ok_or_else(|| {
                    ReconcileError::Config(format!("security group for role {role} is not resolved"))
                })
        };
        let api_port = i32::from(self.cluster.api_server_port);

        let rules = match role {
            SecurityGroupRole::Bastion => vec![
                IngressRule::new(Protocol::Tcp, SSH_PORT, SSH_PORT)
                    .with_cidr(ANYWHERE)
                    .with_description("SSH"),
            ],
            SecurityGroupRole::ApiServerLoadBalancer => vec![
                IngressRule::new(Protocol::Tcp, api_port, api_port)
                    .with_cidr(ANYWHERE)
                    .with_description("Kubernetes API"),
            ],
            SecurityGroupRole::ControlPlane => {
                let bastion = group(SecurityGroupRole::Bastion)?;
                let control_plane = group(SecurityGroupRole::ControlPlane)?;
                let node = group(SecurityGroupRole::Node)?;
                let api_lb = group(SecurityGroupRole::ApiServerLoadBalancer)?;
                let mut rules = vec![
                    IngressRule::new(Protocol::Tcp, SSH_PORT, SSH_PORT)
                        .with_source_group(&bastion)
                        .with_description("SSH"),
                    IngressRule::new(Protocol::Tcp, api_port, api_port)
                        .with_source_groups([
                            api_lb.as_str(),
                            control_plane.as_str(),
                            node.as_str(),
                        ])
                        .with_description("Kubernetes API"),
                    IngressRule::new(Protocol::Tcp, ETCD_CLIENT_PORT, ETCD_CLIENT_PORT)
                        .with_source_group(&control_plane)
                        .with_description("etcd client"),
                    IngressRule::new(Protocol::Tcp, ETCD_PEER_PORT, ETCD_PEER_PORT)
                        .with_source_group(&control_plane)
                        .with_description("etcd peer"),
                ];
                rules.extend(cni_rules(spec, &control_plane, &node));
                rules
            }
            SecurityGroupRole::Node => {
                let bastion = group(SecurityGroupRole::Bastion)?;
                let control_plane = group(SecurityGroupRole::ControlPlane)?;
                let node = group(SecurityGroupRole::Node)?;
                let mut rules = vec![
                    IngressRule::new(Protocol::Tcp, SSH_PORT, SSH_PORT)
                        .with_source_group(&bastion)
                        .with_description("SSH"),
                    IngressRule::new(Protocol::Tcp, NODE_PORT_FROM, NODE_PORT_TO)
                        .with_cidr(ANYWHERE)
                        .with_description("Node port services"),
                    IngressRule::new(Protocol::Tcp, KUBELET_PORT, KUBELET_PORT)
                        .with_source_groups([control_plane.as_str(), node.as_str()])
                        .with_description("Kubelet API"),
                ];
                rules.extend(cni_rules(spec, &control_plane, &node));
                rules
            }
            // Rule ownership is deferred to the in-cluster cloud
            // provider; the group starts and stays empty here.
            SecurityGroupRole::LoadBalancer => Vec::new(),
        };
        Ok(rules)
    }
}

/// Caller-supplied CNI rules, sourced from the control-plane and node
/// groups.
fn cni_rules(spec: &NetworkSpec, control_plane: &str, node: &str) -> Vec<IngressRule> {
    spec.ingress_cni_rules
        .iter()
        .map(|rule| rule.clone().with_source_groups([control_plane, node]))
        .collect()
}
