//! Region-keyed client cache
//!
//! Reconciling clusters across regions reuses one EC2 client per region.
//! The cache is explicit and injectable: the calling layer owns it and
//! hands it to whoever builds reconcilers, instead of the clients living
//! in ambient global state.

use aws_sdk_ec2::config::Region;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::client::AwsCloud;

/// Concurrency-safe region → client cache.
#[derive(Default)]
pub struct SessionCache {
    clients: RwLock<HashMap<String, aws_sdk_ec2::Client>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the client for `region`, building it from `base` on first use.
    /// Concurrent first use for the same region is safe; one of the
    /// builders wins and the rest adopt its client.
    pub async fn client(&self, base: &aws_config::SdkConfig, region: &str) -> aws_sdk_ec2::Client {
        if let Some(client) = self.clients.read().await.get(region) {
            return client.clone();
        }

        let mut clients = self.clients.write().await;
        // Someone else may have built it while we waited for the lock.
        if let Some(client) = clients.get(region) {
            return client.clone();
        }

        tracing::debug!(%region, "building EC2 client");
        let config = aws_sdk_ec2::config::Builder::from(base)
            .region(Region::new(region.to_string()))
            .build();
        let client = aws_sdk_ec2::Client::from_conf(config);
        clients.insert(region.to_string(), client.clone());
        client
    }

    /// The cached [`AwsCloud`] for `region`.
    pub async fn cloud(&self, base: &aws_config::SdkConfig, region: &str) -> AwsCloud {
        AwsCloud::from_client(self.client(base, region).await)
    }
}
