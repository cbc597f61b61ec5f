use tonic::async_trait;
use tonic::transport::Channel;
use tonic::Request;

use super::connect_channel;
use crate::proto::revision::revision_service_client::RevisionServiceClient;
use crate::proto::revision::ChangeRevisionRequest as ChangeRevisionRequestProto;
use crate::proto::revision::VersionConfigRequest;
use crate::utils::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::ChangeRevisionRequest;
use crate::ConfigProvider;
use crate::DiffServiceError;
use crate::NetworkConfig;
use crate::ReconcileError;
use crate::Result;
use crate::RevisionDiffService;
use crate::VersionConfig;
use crate::VersionConfigError;

/// gRPC-backed revision service client: change-revision computation plus
/// the typed version-config lookup.
pub struct GrpcRevisionService {
    client: RevisionServiceClient<Channel>,
}

impl GrpcRevisionService {
    pub async fn connect(settings: &NetworkConfig, policy: &BackoffPolicy) -> Result<Self> {
        let channel = task_with_timeout_and_exponential_backoff(
            || connect_channel(&settings.revision_service_address, settings),
            policy,
        )
        .await?;

        Ok(Self {
            client: RevisionServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl RevisionDiffService for GrpcRevisionService {
    async fn get_change_revision(
        &self,
        request: ChangeRevisionRequest,
    ) -> Result<Option<String>> {
        let mut client = self.client.clone();
        let response = client
            .get_change_revision(Request::new(ChangeRevisionRequestProto {
                app_name: request.app_name,
                namespace: request.namespace,
                current_revision: request.current_revision,
                previous_revision: request.previous_revision,
            }))
            .await
            .map_err(|status| {
                ReconcileError::DiffService(DiffServiceError::Rpc(Box::new(status)))
            })?;

        let revision = response.into_inner().revision;
        Ok((!revision.is_empty()).then_some(revision))
    }
}

#[async_trait]
impl ConfigProvider for GrpcRevisionService {
    async fn get_config(&self) -> Result<VersionConfig> {
        let mut client = self.client.clone();
        let response = client
            .get_version_config(Request::new(VersionConfigRequest {}))
            .await
            .map_err(|status| VersionConfigError::Rpc(Box::new(status)))?
            .into_inner();

        Ok(VersionConfig {
            product_label: response.product_label,
            json_path: response.json_path,
            resource_name: response.resource_name,
        })
    }
}
