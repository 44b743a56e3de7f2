//! Shared convergence helpers
//!
//! Every reconciler follows the same describe → match → create → tag
//! shape; the pieces that are genuinely identical live here.

use crate::error::Result;
use netforge_cloud::{BackoffPolicy, CloudError, NetworkCloud, retry_with_backoff};
use netforge_core::Tags;

/// Converge a live resource's tags to `want`.
///
/// Only missing or stale pairs are sent. Tagging a resource right after
/// creating it can race the resource becoming visible to the tagging
/// API, so the call is wrapped in the retry harness.
pub(crate) async fn ensure_tags<C: NetworkCloud>(
    cloud: &C,
    backoff: &BackoffPolicy,
    resource_id: &str,
    current: &Tags,
    want: &Tags,
) -> Result<()> {
    let missing = want.difference(current);
    if missing.is_empty() {
        return Ok(());
    }

    tracing::debug!(resource = %resource_id, count = missing.len(), "updating tags");
    retry_with_backoff(backoff, CloudError::is_retryable, || {
        cloud.create_tags(resource_id, &missing)
    })
    .await?;
    Ok(())
}

/// Treat "already gone" as success during teardown.
pub(crate) fn ignore_not_found(result: netforge_cloud::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}
