use tonic::async_trait;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::Code;
use tonic::Request;

use super::connect_channel;
use crate::proto::application::application_service_client::ApplicationServiceClient;
use crate::proto::application::GetApplicationRequest;
use crate::proto::application::PatchApplicationRequest;
use crate::utils::task_with_timeout_and_exponential_backoff;
use crate::Application;
use crate::ApplicationStore;
use crate::BackoffPolicy;
use crate::NetworkConfig;
use crate::ReconcileError;
use crate::Result;
use crate::StoreError;

/// gRPC-backed [`ApplicationStore`]. Documents travel as JSON manifests
/// and are decoded into the typed model on arrival.
pub struct GrpcApplicationStore {
    client: ApplicationServiceClient<Channel>,
}

impl GrpcApplicationStore {
    pub async fn connect(settings: &NetworkConfig, policy: &BackoffPolicy) -> Result<Self> {
        let channel = task_with_timeout_and_exponential_backoff(
            || connect_channel(&settings.application_service_address, settings),
            policy,
        )
        .await?;

        let client = ApplicationServiceClient::new(channel)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip);
        Ok(Self { client })
    }

    fn decode(manifest: &str) -> Result<Application> {
        let app = serde_json::from_str(manifest)
            .map_err(|e| ReconcileError::Store(StoreError::Decode(e)))?;
        Ok(app)
    }

    fn store_error(namespace: &str, name: &str, status: tonic::Status) -> ReconcileError {
        if status.code() == Code::NotFound {
            return ReconcileError::Store(StoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        ReconcileError::Store(StoreError::Rpc(Box::new(status)))
    }
}

#[async_trait]
impl ApplicationStore for GrpcApplicationStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Application> {
        let mut client = self.client.clone();
        let response = client
            .get_application(Request::new(GetApplicationRequest {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }))
            .await
            .map_err(|status| Self::store_error(namespace, name, status))?;

        Self::decode(&response.into_inner().manifest)
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        merge_patch: serde_json::Value,
    ) -> Result<Application> {
        let mut client = self.client.clone();
        let response = client
            .patch_application(Request::new(PatchApplicationRequest {
                namespace: namespace.to_string(),
                name: name.to_string(),
                merge_patch: merge_patch.to_string(),
            }))
            .await
            .map_err(|status| Self::store_error(namespace, name, status))?;

        Self::decode(&response.into_inner().manifest)
    }
}
