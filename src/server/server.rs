//! Long-running composition of watch feed, feature gate, and controller.
//!
//! ## Startup order
//! 1. The watch feed connects and replays the initial burst.
//! 2. The server waits for the feed's cache-sync signal; the controller
//!    must never act on a partial view of the world.
//! 3. The feature gate starts polling, and the controller runs whenever
//!    the gate is open.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use crate::utils::spawn_task;
use crate::Broadcaster;
use crate::ChangeRevisionController;
use crate::Error;
use crate::FeatureManager;
use crate::GrpcApplicationStore;
use crate::GrpcRevisionService;
use crate::GrpcWatchFeed;
use crate::Result;
use crate::RevisionReconciler;
use crate::Settings;
use crate::VersionConfigManager;

pub type EngineReconciler = RevisionReconciler<GrpcApplicationStore, GrpcRevisionService>;

pub struct Server {
    pub(crate) settings: Arc<Settings>,
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) controller: Arc<ChangeRevisionController<EngineReconciler>>,
    pub(crate) watch_feed: Arc<GrpcWatchFeed>,
    pub(crate) feature_manager: Arc<FeatureManager>,
    pub(crate) version_config: VersionConfigManager<GrpcRevisionService>,
    pub(crate) shutdown_signal: watch::Receiver<()>,
}

impl Server {
    pub async fn run(&self) -> Result<()> {
        // 1. Watch feed
        let (ready_tx, mut ready_rx) = watch::channel(false);
        {
            let feed = self.watch_feed.clone();
            let broadcaster = self.broadcaster.clone();
            let shutdown_signal = self.shutdown_signal.clone();
            spawn_task(
                "watch-feed",
                move || async move { feed.run(broadcaster, ready_tx, shutdown_signal).await },
                None,
            )
            .await;
        }

        // 2. Cache sync gate
        let sync_timeout = Duration::from_millis(self.settings.controller.cache_sync_timeout_ms);
        let synced = tokio::time::timeout(sync_timeout, async {
            while !*ready_rx.borrow() {
                if ready_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        if synced.is_err() {
            return Err(Error::Fatal(
                "Timed out waiting for watch cache to sync".into(),
            ));
        }
        info!("watch cache synced, starting controller supervision");

        // 3. Version config is informational; a failure is not fatal
        match self.version_config.obtain().await {
            Ok(config) => {
                info!(product_label = %config.product_label, "version config loaded")
            }
            Err(e) => warn!("failed to load version config: {:?}", e),
        }

        // 4. Feature gate poller
        {
            let manager = self.feature_manager.clone();
            let shutdown_signal = self.shutdown_signal.clone();
            spawn_task(
                "feature-gate",
                move || async move {
                    manager
                        .run(
                            || {
                                Settings::load(None)
                                    .ok()
                                    .map(|s| s.controller.change_revision_enabled)
                            },
                            shutdown_signal,
                        )
                        .await
                },
                None,
            )
            .await;
        }

        // 5. Controller lifecycle follows the gate until shutdown
        self.supervise_controller().await
    }

    async fn supervise_controller(&self) -> Result<()> {
        let mut feature_rx = self.feature_manager.subscribe();
        let mut shutdown_signal = self.shutdown_signal.clone();
        let mut controller_stop: Option<watch::Sender<()>> = None;

        if *feature_rx.borrow_and_update() {
            controller_stop = Some(self.start_controller().await);
        } else {
            info!("change revision controller disabled by feature gate");
        }

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    if let Some(stop) = controller_stop.take() {
                        let _ = stop.send(());
                    }
                    warn!("server shutting down");
                    return Err(Error::Exit);
                }

                changed = feature_rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::Exit);
                    }
                    let enabled = *feature_rx.borrow_and_update();
                    match (enabled, controller_stop.is_some()) {
                        (true, false) => {
                            controller_stop = Some(self.start_controller().await);
                        }
                        (false, true) => {
                            if let Some(stop) = controller_stop.take() {
                                let _ = stop.send(());
                                info!("change revision controller stopped by feature gate");
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn start_controller(&self) -> watch::Sender<()> {
        let (stop_tx, stop_rx) = watch::channel(());
        let controller = self.controller.clone();
        spawn_task(
            "change-revision-controller",
            move || async move { controller.run(stop_rx).await },
            None,
        )
        .await;
        stop_tx
    }
}
