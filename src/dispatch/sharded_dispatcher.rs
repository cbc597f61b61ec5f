//! Per-application serializing, globally concurrency-bounded event router.
//!
//! Events for one application land in a dedicated FIFO queue drained by a
//! single worker, so stale snapshots are never processed after fresh ones.
//! A process-wide semaphore caps how many callbacks run at once across all
//! applications, independent of how many distinct applications are active.
//! Enqueue never blocks: overflow is dropped and counted per application.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::sync::Semaphore;
use tonic::async_trait;
use tracing::debug;
use tracing::warn;

use crate::metrics::IGNORED_EVENTS_METRIC;
use crate::metrics::RECONCILE_PERMITS_METRIC;
use crate::metrics::SHARD_QUEUE_DEPTH_METRIC;
use crate::AppKey;
use crate::Application;
use crate::WatchEventType;

/// One unit of work routed to an application's worker.
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub application: Application,
    pub event_type: WatchEventType,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    /// Handle one event. The return value is informational only; failures
    /// must be handled (and logged) by the processor itself.
    async fn process(&self, payload: EventPayload) -> bool;
}

pub struct ShardedDispatcher<P>
where
    P: EventProcessor,
{
    processor: Arc<P>,
    channels: Arc<DashMap<AppKey, mpsc::Sender<EventPayload>>>,
    sem: Arc<Semaphore>,
    queue_capacity: usize,
    shutdown_signal: watch::Receiver<()>,
}

impl<P> ShardedDispatcher<P>
where
    P: EventProcessor,
{
    pub fn new(
        processor: Arc<P>,
        max_concurrent: usize,
        queue_capacity: usize,
        sample_interval: Duration,
        shutdown_signal: watch::Receiver<()>,
    ) -> Arc<Self> {
        let channels = Arc::new(DashMap::new());
        Self::spawn_depth_sampler(channels.clone(), sample_interval, shutdown_signal.clone());
        Arc::new(Self {
            processor,
            channels,
            sem: Arc::new(Semaphore::new(max_concurrent)),
            queue_capacity,
            shutdown_signal,
        })
    }

    /// Route `event` into the queue dedicated to its application. The
    /// worker for that application is created atomically on first use. A
    /// full queue drops the event and bumps the ignored-events counter.
    pub fn subscribe(&self, application: Application, event_type: WatchEventType) {
        let key = application.key();

        let tx = {
            let entry = self
                .channels
                .entry(key.clone())
                .or_insert_with(|| self.spawn_worker(key.clone()));
            entry.value().clone()
        };

        match tx.try_send(EventPayload {
            application,
            event_type,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                IGNORED_EVENTS_METRIC
                    .with_label_values(&[&key.to_string()])
                    .inc();
                warn!(application = %key, "shard queue full, event ignored");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(application = %key, "shard worker gone, event ignored");
            }
        }
    }

    fn spawn_worker(&self, key: AppKey) -> mpsc::Sender<EventPayload> {
        let (tx, mut rx) = mpsc::channel::<EventPayload>(self.queue_capacity);
        let processor = self.processor.clone();
        let sem = self.sem.clone();
        let mut shutdown_signal = self.shutdown_signal.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_signal.changed() => {
                        debug!(application = %key, "shard worker shutting down");
                        return;
                    }

                    maybe_payload = rx.recv() => {
                        let Some(payload) = maybe_payload else {
                            return;
                        };
                        // Callbacks across all applications share one
                        // permit pool; this worker parks here while the
                        // process is saturated.
                        let Ok(_permit) = sem.acquire().await else {
                            return;
                        };
                        RECONCILE_PERMITS_METRIC.inc();
                        let result = processor.process(payload).await;
                        debug!(application = %key, result, "shard callback finished");
                        RECONCILE_PERMITS_METRIC.dec();
                    }
                }
            }
        });

        tx
    }

    // Periodically export every queue's depth; mirrors what operators
    // alert on when one application wedges its consumer.
    fn spawn_depth_sampler(
        channels: Arc<DashMap<AppKey, mpsc::Sender<EventPayload>>>,
        interval: Duration,
        mut shutdown_signal: watch::Receiver<()>,
    ) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_signal.changed() => {
                        return;
                    }
                    _ = ticker.tick() => {
                        for entry in channels.iter() {
                            let depth = entry.value().max_capacity() - entry.value().capacity();
                            SHARD_QUEUE_DEPTH_METRIC
                                .with_label_values(&[&entry.key().to_string()])
                                .set(depth as f64);
                            debug!(application = %entry.key(), depth, "shard queue depth");
                        }
                    }
                }
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn shard_count(&self) -> usize {
        self.channels.len()
    }
}
