//! netforge cloud boundary
//!
//! This crate defines the seam between the reconciliation engine and a
//! cloud account:
//!
//! - [`NetworkCloud`]: the async trait every backend implements, one
//!   method per describe/create/delete primitive
//! - observed-resource types ([`Network`], [`Subnet`], [`NatGateway`],
//!   [`RouteTable`], [`SecurityGroup`], ...) as returned by discovery
//! - [`CloudError`]: the error taxonomy shared by all backends
//! - [`retry_with_backoff`]: the bounded retry harness for
//!   eventually-consistent APIs
//!
//! Backends live in sibling crates (`netforge-cloud-aws`); tests drive
//! the engine through an in-memory implementation of the same trait.

pub mod api;
pub mod error;
pub mod retry;
pub mod types;

// Re-exports
pub use api::NetworkCloud;
pub use error::{CloudError, Result};
pub use retry::{BackoffPolicy, retry_with_backoff};
pub use types::{
    Address, InternetGateway, NatGateway, NatGatewayState, Network, Route, RouteTable,
    RouteTableAssociation, RouteTarget, SecurityGroup, Subnet,
};
