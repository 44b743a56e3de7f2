//! EC2 error translation

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use netforge_cloud::CloudError;

/// Translate an SDK error into the shared error taxonomy.
///
/// EC2 reports missing resources through per-kind error codes
/// (`InvalidVpcID.NotFound`, `InvalidGroup.NotFound`,
/// `NatGatewayNotFound`, ...); all of them contain `NotFound` and map to
/// the retryable class. Everything else keeps the operation name and
/// resource identifier for diagnosis.
pub(crate) fn translate<E, R>(
    operation: &'static str,
    kind: &'static str,
    resource: &str,
    err: SdkError<E, R>,
) -> CloudError
where
    E: ProvideErrorMetadata,
{
    let code = err.code().unwrap_or_default();
    if code.contains("NotFound") {
        return CloudError::not_found(kind, resource);
    }

    let message = match err.message() {
        Some(message) => format!("{code}: {message}"),
        None => code.to_string(),
    };
    CloudError::api(operation, resource, message)
}
