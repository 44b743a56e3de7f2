//! Resource tagging schema and ownership classification
//!
//! Every resource created by the engine carries the cluster ownership tag,
//! a `Name` tag, and a role tag. Ownership of pre-existing resources is
//! never assumed: a resource is only mutated or deleted if its tags say
//! this cluster owns it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The `Name` tag key, shown by cloud consoles.
pub const NAME_TAG: &str = "Name";

/// Tag key recording which role a resource plays within the cluster.
pub const ROLE_TAG: &str = "netforge.io/role";

/// Value of the ownership tag on resources created by this engine.
pub const OWNED: &str = "owned";

/// Ownership tag key for a cluster.
pub fn cluster_tag_key(cluster: &str) -> String {
    format!("netforge.io/cluster/{cluster}")
}

/// Tag key consumed by the in-cluster cloud provider. Its presence on a
/// security group signals that ingress rules are managed by that external
/// component, not by this engine.
pub fn cloud_provider_tag_key(cluster: &str) -> String {
    format!("kubernetes.io/cluster/{cluster}")
}

/// An ordered map of resource tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &Tags) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Tags present in `self` that are missing or carry a different value
    /// in `other`. Used to decide whether a live resource needs re-tagging.
    pub fn difference(&self, other: &Tags) -> Tags {
        let mut diff = Tags::new();
        for (key, value) in self.iter() {
            if other.get(key) != Some(value.as_str()) {
                diff.insert(key.clone(), value.clone());
            }
        }
        diff
    }

    /// Whether the ownership tag marks this resource as owned by `cluster`.
    pub fn has_owned(&self, cluster: &str) -> bool {
        self.get(&cluster_tag_key(cluster)) == Some(OWNED)
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

/// Parameters for building the canonical tag set of an owned resource.
#[derive(Debug, Clone)]
pub struct TagParams<'a> {
    pub cluster: &'a str,
    pub name: String,
    pub role: &'a str,
    pub additional: &'a Tags,
}

impl TagParams<'_> {
    /// Build the full tag set. Reserved keys win over caller-supplied
    /// additional tags.
    pub fn build(&self) -> Tags {
        let mut tags = self.additional.clone();
        tags.insert(NAME_TAG, self.name.clone());
        tags.insert(ROLE_TAG, self.role);
        tags.insert(cluster_tag_key(self.cluster), OWNED);
        tags
    }
}

/// Who manages a resource's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceOwnership {
    /// Created by this engine; mutated and deleted freely.
    Owned,
    /// Pre-existing, brought by the caller; discovered only.
    Unmanaged,
    /// Owned by this cluster but configured by an external component
    /// (the in-cluster cloud provider).
    ExternallyOwned,
}

impl ResourceOwnership {
    /// Classify a resource from its live tags. The cloud-provider tag
    /// takes precedence over the ownership tag: such resources may still
    /// be deleted with the cluster, but their configuration is not ours.
    pub fn from_tags(cluster: &str, tags: &Tags) -> Self {
        if tags.contains_key(&cloud_provider_tag_key(cluster)) {
            ResourceOwnership::ExternallyOwned
        } else if tags.has_owned(cluster) {
            ResourceOwnership::Owned
        } else {
            ResourceOwnership::Unmanaged
        }
    }

    pub fn is_owned(self) -> bool {
        self == ResourceOwnership::Owned
    }

    pub fn is_unmanaged(self) -> bool {
        self == ResourceOwnership::Unmanaged
    }
}

impl fmt::Display for ResourceOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceOwnership::Owned => write!(f, "owned"),
            ResourceOwnership::Unmanaged => write!(f, "unmanaged"),
            ResourceOwnership::ExternallyOwned => write!(f, "externally-owned"),
        }
    }
}
