//! AWS EC2 backend for netforge
//!
//! Implements the [`netforge_cloud::NetworkCloud`] trait on top of
//! `aws-sdk-ec2`: virtual networks map to VPCs, and the rest of the
//! surface maps one-to-one onto EC2 calls. EC2 error codes signalling
//! "does not exist" are translated to `CloudError::NotFound` so the
//! engine's retry and teardown logic can classify them.

pub mod client;
pub mod session;

mod convert;
mod error;

// Re-exports
pub use client::AwsCloud;
pub use session::SessionCache;
