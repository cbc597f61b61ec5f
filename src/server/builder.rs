//! Assembles the engine's components in dependency order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use super::Server;
use crate::wait_for_revision_service;
use crate::Broadcaster;
use crate::ChangeRevisionController;
use crate::FeatureManager;
use crate::GrpcApplicationStore;
use crate::GrpcRevisionService;
use crate::GrpcWatchFeed;
use crate::Result;
use crate::RevisionReconciler;
use crate::Settings;
use crate::VersionConfigManager;

pub struct ServerBuilder {
    settings: Settings,
    shutdown_signal: watch::Receiver<()>,
}

impl ServerBuilder {
    pub fn init(settings: Settings, shutdown_signal: watch::Receiver<()>) -> Self {
        Self {
            settings,
            shutdown_signal,
        }
    }

    /// Start the `/metrics` + `/healthz` endpoint when monitoring is
    /// enabled.
    pub fn start_metrics_server(self, shutdown_signal: watch::Receiver<()>) -> Self {
        if self.settings.monitoring.prometheus_enabled {
            let port = self.settings.monitoring.prometheus_port;
            info!("starting metrics server on port {}", port);
            tokio::spawn(async move {
                crate::metrics::start_server(port, shutdown_signal).await;
            });
        }
        self
    }

    /// Probe the upstreams and wire the pipeline. Blocks until both
    /// services answer or the retry policies are exhausted.
    pub async fn build(self) -> Result<Server> {
        let settings = Arc::new(self.settings);

        // the controller is useless without a responsive diff service
        wait_for_revision_service(&settings.network, &settings.retry.healthcheck).await?;

        let store = Arc::new(
            GrpcApplicationStore::connect(&settings.network, &settings.retry.connect).await?,
        );
        let revision_service = Arc::new(
            GrpcRevisionService::connect(&settings.network, &settings.retry.connect).await?,
        );

        let broadcaster = Broadcaster::new();
        let reconciler = Arc::new(RevisionReconciler::new(store, revision_service.clone()));
        let controller = Arc::new(ChangeRevisionController::new(
            broadcaster.clone(),
            reconciler,
            settings.controller.clone(),
        ));
        let watch_feed = Arc::new(GrpcWatchFeed::new(
            settings.network.clone(),
            settings.retry.watch,
        ));
        let feature_manager = Arc::new(FeatureManager::new(
            settings.controller.change_revision_enabled,
            Duration::from_millis(settings.controller.feature_poll_interval_ms),
        ));
        let version_config = VersionConfigManager::new(revision_service);

        Ok(Server {
            settings,
            broadcaster,
            controller,
            watch_feed,
            feature_manager,
            version_config,
            shutdown_signal: self.shutdown_signal,
        })
    }
}
