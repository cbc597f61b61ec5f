//! Orchestration glue between the broadcaster and the reconciler.
//!
//! The loop subscribes to the all-events class, discards bookmarks and
//! applications that are not tracked or have no pending sync, and routes
//! everything else through the sharded dispatcher. The dispatcher worker
//! runs the reconciler under the per-event deadline, so events for one
//! application stay ordered while the global concurrency cap holds.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::timeout;
use tonic::async_trait;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::RECONCILE_DURATION_METRIC;
use crate::ApplicationWatchEvent;
use crate::Broadcaster;
use crate::ChangeRevisionReconciler;
use crate::ControllerConfig;
use crate::Error;
use crate::EventPayload;
use crate::EventProcessor;
use crate::ReconcileOutcome;
use crate::Result;
use crate::ShardedDispatcher;
use crate::WatchEventType;

/// Dispatcher callback: one reconciliation under the deadline.
pub struct ReconcileProcessor<R>
where
    R: ChangeRevisionReconciler,
{
    reconciler: Arc<R>,
    deadline: Duration,
}

#[async_trait]
impl<R> EventProcessor for ReconcileProcessor<R>
where
    R: ChangeRevisionReconciler,
{
    async fn process(&self, payload: EventPayload) -> bool {
        let key = payload.application.key();
        let started = Instant::now();

        let outcome = timeout(
            self.deadline,
            self.reconciler.reconcile(&payload.application),
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis() as f64;
        match outcome {
            Ok(Ok(ReconcileOutcome::Patched { ref revision, .. })) => {
                info!(application = %key, revision = %revision, "change revision persisted");
                RECONCILE_DURATION_METRIC
                    .with_label_values(&["patched"])
                    .observe(elapsed_ms);
                true
            }
            Ok(Ok(ReconcileOutcome::Skipped)) => {
                RECONCILE_DURATION_METRIC
                    .with_label_values(&["skipped"])
                    .observe(elapsed_ms);
                true
            }
            Ok(Err(e)) => {
                // surfaced here, not retried; the next watch event for
                // this application retriggers safely
                error!(application = %key, "failed to reconcile change revision: {:?}", e);
                RECONCILE_DURATION_METRIC
                    .with_label_values(&["error"])
                    .observe(elapsed_ms);
                false
            }
            Err(_) => {
                error!(application = %key, "change revision deadline exceeded");
                RECONCILE_DURATION_METRIC
                    .with_label_values(&["deadline"])
                    .observe(elapsed_ms);
                false
            }
        }
    }
}

pub struct ChangeRevisionController<R>
where
    R: ChangeRevisionReconciler,
{
    broadcaster: Arc<Broadcaster>,
    reconciler: Arc<R>,
    config: ControllerConfig,
}

impl<R> ChangeRevisionController<R>
where
    R: ChangeRevisionReconciler,
{
    pub fn new(broadcaster: Arc<Broadcaster>, reconciler: Arc<R>, config: ControllerConfig) -> Self {
        Self {
            broadcaster,
            reconciler,
            config,
        }
    }

    /// Consume watch events until `shutdown_signal` fires. The
    /// subscription is released when the loop returns.
    pub async fn run(&self, mut shutdown_signal: watch::Receiver<()>) -> Result<()> {
        let processor = Arc::new(ReconcileProcessor {
            reconciler: self.reconciler.clone(),
            deadline: Duration::from_millis(self.config.reconcile_deadline_ms),
        });
        let dispatcher = ShardedDispatcher::new(
            processor,
            self.config.max_concurrent_reconciles,
            self.config.shard_queue_capacity,
            Duration::from_millis(self.config.queue_sample_interval_ms),
            shutdown_signal.clone(),
        );

        let (events_tx, mut events_rx) = mpsc::channel(self.config.subscription_buffer_size);
        let _subscription = self.broadcaster.subscribe(events_tx, vec![]);

        info!("change revision controller started");

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    warn!("change revision controller shutting down");
                    return Err(Error::Exit);
                }

                maybe_event = events_rx.recv() => {
                    let Some(event) = maybe_event else {
                        return Err(Error::Exit);
                    };
                    if !eligible(&event) {
                        continue;
                    }
                    dispatcher.subscribe(event.application.clone(), event.event_type);
                }
            }
        }
    }
}

// Cheap gates applied before any store access: bookmarks carry no state,
// untracked applications never get a change revision, and an application
// without a pending sync has nothing to reconcile.
fn eligible(event: &ApplicationWatchEvent) -> bool {
    if event.event_type == WatchEventType::Bookmark {
        return false;
    }
    if !event.application.tracks_manifest_paths() {
        return false;
    }
    event.application.has_pending_sync()
}
