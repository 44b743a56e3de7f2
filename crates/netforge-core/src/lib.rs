//! netforge core model
//!
//! This crate defines the declarative network topology model shared by the
//! reconciliation engine and its cloud backends:
//!
//! - [`NetworkSpec`] / [`NetworkStatus`]: desired and observed state of a
//!   cluster's network infrastructure
//! - [`IngressRule`] and the rule-set algebra used to converge security
//!   group permissions
//! - [`SecurityGroupRole`]: the five security group roles managed per
//!   cluster
//! - the resource tagging schema and [`ResourceOwnership`] classification
//!
//! The model is plain data: every type serializes with serde so the caller
//! can persist spec and status however it likes. All cloud interaction
//! lives in `netforge-cloud` and its backend crates.

pub mod network;
pub mod roles;
pub mod rules;
pub mod tags;

// Re-exports
pub use network::{
    DEFAULT_NETWORK_CIDR, NetworkConfig, NetworkSpec, NetworkState, NetworkStatus,
    SecurityGroupStatus, SubnetSpec,
};
pub use roles::SecurityGroupRole;
pub use rules::{IngressRule, Protocol, RuleDiff, diff_rules};
pub use tags::{
    NAME_TAG, OWNED, ROLE_TAG, ResourceOwnership, TagParams, Tags, cloud_provider_tag_key,
    cluster_tag_key,
};
