use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::HealthCheckResponse;
use tracing::error;

use super::connect_channel;
use crate::constants::REVISION_SERVICE_HEALTH_NAME;
use crate::utils::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::NetworkConfig;
use crate::NetworkError;
use crate::Result;

/// Block until the revision service reports SERVING, under the given
/// retry policy. The controller must not start reconciling against a
/// service that cannot answer yet.
pub async fn wait_for_revision_service(
    settings: &NetworkConfig,
    policy: &BackoffPolicy,
) -> Result<()> {
    task_with_timeout_and_exponential_backoff(
        || check_revision_service(settings),
        policy,
    )
    .await
}

async fn check_revision_service(settings: &NetworkConfig) -> Result<()> {
    let channel = connect_channel(&settings.revision_service_address, settings).await?;
    let mut client = HealthClient::new(channel);

    let request = tonic::Request::new(HealthCheckRequest {
        service: REVISION_SERVICE_HEALTH_NAME.to_string(),
    });

    let response: HealthCheckResponse = client
        .check(request)
        .await
        .map_err(|err| {
            error!(
                "health check against {} failed: {}",
                settings.revision_service_address, err
            );
            NetworkError::ConnectError
        })?
        .into_inner();

    if response.status() != ServingStatus::Serving {
        return Err(NetworkError::ServiceUnavailable(
            settings.revision_service_address.clone(),
        )
        .into());
    }
    Ok(())
}
