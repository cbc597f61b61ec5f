//! Streaming watch client feeding the broadcaster.
//!
//! The feed stays connected for the life of the process, reconnecting with
//! backoff whenever the server closes the stream. The first bookmark on a
//! fresh stream marks the end of the initial burst; the readiness signal
//! flips to `true` there and stays up across reconnects, mirroring the
//! upstream cache's synced-once semantics.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use super::connect_channel;
use crate::proto::application::application_service_client::ApplicationServiceClient;
use crate::proto::application::WatchApplicationsRequest;
use crate::Application;
use crate::BackoffPolicy;
use crate::Broadcaster;
use crate::Error;
use crate::NetworkConfig;
use crate::NetworkError;
use crate::Result;
use crate::WatchEventType;

pub struct GrpcWatchFeed {
    settings: NetworkConfig,
    policy: BackoffPolicy,
}

impl GrpcWatchFeed {
    pub fn new(settings: NetworkConfig, policy: BackoffPolicy) -> Self {
        Self { settings, policy }
    }

    /// Run until shutdown, feeding every stream event into the
    /// broadcaster's ingestion hooks.
    pub async fn run(
        &self,
        broadcaster: Arc<Broadcaster>,
        ready_tx: watch::Sender<bool>,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<()> {
        let max_delay = Duration::from_millis(self.policy.max_delay_ms);
        let mut delay = Duration::from_millis(self.policy.base_delay_ms);

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    warn!("watch feed shutting down");
                    return Err(Error::Exit);
                }

                outcome = self.stream_once(&broadcaster, &ready_tx) => {
                    if let Err(e) = outcome {
                        warn!("watch stream ended: {:?}", e);
                    }
                }
            }

            tokio::select! {
                _ = shutdown_signal.changed() => {
                    return Err(Error::Exit);
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = std::cmp::min(delay * 2, max_delay);
        }
    }

    async fn stream_once(
        &self,
        broadcaster: &Arc<Broadcaster>,
        ready_tx: &watch::Sender<bool>,
    ) -> Result<()> {
        let channel =
            connect_channel(&self.settings.application_service_address, &self.settings).await?;
        let mut client = ApplicationServiceClient::new(channel);

        let mut stream = client
            .watch_applications(WatchApplicationsRequest {
                namespace: self.settings.watch_namespace.clone(),
            })
            .await
            .map_err(|status| NetworkError::TonicStatusError(Box::new(status)))?
            .into_inner();

        info!("watch stream established");

        while let Some(payload) = stream
            .message()
            .await
            .map_err(|status| NetworkError::TonicStatusError(Box::new(status)))?
        {
            let Some(kind) = WatchEventType::from_wire(&payload.event_type) else {
                warn!(event_type = %payload.event_type, "unknown watch event kind");
                continue;
            };

            if kind == WatchEventType::Bookmark {
                if !ready_tx.send_replace(true) {
                    info!("watch cache synced");
                }
                broadcaster.on_bookmark();
                continue;
            }

            let app: Application = match serde_json::from_str(&payload.manifest) {
                Ok(app) => app,
                Err(e) => {
                    // one malformed document must not take the feed down
                    warn!("dropping undecodable watch event: {}", e);
                    continue;
                }
            };

            match kind {
                WatchEventType::Added => broadcaster.on_add(app),
                WatchEventType::Modified => broadcaster.on_update(None, app),
                WatchEventType::Deleted => broadcaster.on_delete(app),
                WatchEventType::Bookmark => unreachable!("handled above"),
            }
        }

        Err(NetworkError::WatchStreamClosed.into())
    }
}
