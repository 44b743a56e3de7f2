//! Ingress rule model and set algebra
//!
//! Cloud ingress APIs accept and return whole permission objects, so the
//! algebra treats each rule as an atomic set element: a rule with one
//! extra CIDR is a different rule, not a superset. Convergence is then a
//! plain set difference in both directions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// IP protocol of an ingress rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    All,
}

impl Protocol {
    /// Wire representation used by cloud ingress APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Icmpv6 => "icmpv6",
            Protocol::All => "-1",
        }
    }

    /// Parse the wire representation, accepting both names and the
    /// numeric forms cloud APIs echo back.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "tcp" | "6" => Protocol::Tcp,
            "udp" | "17" => Protocol::Udp,
            "icmp" | "1" => Protocol::Icmp,
            "icmpv6" | "58" => Protocol::Icmpv6,
            _ => Protocol::All,
        }
    }

    /// Port ranges are meaningful for TCP/UDP (ports) and ICMP/ICMPv6
    /// (type and code), not for the wildcard protocol.
    pub fn uses_ports(&self) -> bool {
        !matches!(self, Protocol::All)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inbound permission on a security group.
///
/// Equality is structural and ignores `description`: two rules that admit
/// the same traffic are the same rule, whatever they are labelled. The
/// description is still carried so newly authorized rules keep theirs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr_blocks: BTreeSet<String>,
    pub source_security_group_ids: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
}

impl PartialEq for IngressRule {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.from_port == other.from_port
            && self.to_port == other.to_port
            && self.cidr_blocks == other.cidr_blocks
            && self.source_security_group_ids == other.source_security_group_ids
    }
}

impl Eq for IngressRule {}

impl IngressRule {
    pub fn new(protocol: Protocol, from_port: i32, to_port: i32) -> Self {
        Self {
            protocol,
            from_port,
            to_port,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr_blocks.insert(cidr.into());
        self
    }

    pub fn with_source_group(mut self, group_id: impl Into<String>) -> Self {
        self.source_security_group_ids.insert(group_id.into());
        self
    }

    pub fn with_source_groups<I, S>(mut self, group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in group_ids {
            self.source_security_group_ids.insert(id.into());
        }
        self
    }

    /// A rule with no sources admits nothing and is not worth sending to
    /// the cloud API.
    pub fn has_sources(&self) -> bool {
        !self.cidr_blocks.is_empty() || !self.source_security_group_ids.is_empty()
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} from [{}]",
            self.protocol,
            self.from_port,
            self.to_port,
            self.cidr_blocks
                .iter()
                .map(String::as_str)
                .chain(self.source_security_group_ids.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Outcome of diffing current against desired ingress rules.
#[derive(Debug, Clone, Default)]
pub struct RuleDiff {
    /// Rules present on the group but absent from the desired set.
    pub to_revoke: Vec<IngressRule>,
    /// Rules in the desired set but absent from the group.
    pub to_authorize: Vec<IngressRule>,
}

impl RuleDiff {
    pub fn is_converged(&self) -> bool {
        self.to_revoke.is_empty() && self.to_authorize.is_empty()
    }
}

/// Compute the two-sided set difference between `current` and `desired`.
pub fn diff_rules(current: &[IngressRule], desired: &[IngressRule]) -> RuleDiff {
    let to_revoke = current
        .iter()
        .filter(|&rule| !desired.contains(rule))
        .cloned()
        .collect();
    let to_authorize = desired
        .iter()
        .filter(|&rule| !current.contains(rule))
        .cloned()
        .collect();
    RuleDiff {
        to_revoke,
        to_authorize,
    }
}
