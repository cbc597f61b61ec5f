use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters of the event-distribution and reconciliation pipeline.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Capacity of the controller loop's subscription queue. Events beyond
    /// this are dropped by the broadcaster rather than blocking delivery.
    #[serde(default = "default_subscription_buffer_size")]
    pub subscription_buffer_size: usize,

    /// Capacity of each per-application dispatch queue.
    #[serde(default = "default_shard_queue_capacity")]
    pub shard_queue_capacity: usize,

    /// Global cap on concurrently running reconciliations across all
    /// applications.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// Per-event reconciliation deadline in milliseconds.
    #[serde(default = "default_reconcile_deadline_ms")]
    pub reconcile_deadline_ms: u64,

    /// Interval at which per-application queue depths are sampled into
    /// gauges.
    #[serde(default = "default_queue_sample_interval_ms")]
    pub queue_sample_interval_ms: u64,

    /// Whether the change-revision controller starts enabled. The feature
    /// gate may flip this at runtime.
    #[serde(default = "default_change_revision_enabled")]
    pub change_revision_enabled: bool,

    /// Feature-gate poll interval in milliseconds.
    #[serde(default = "default_feature_poll_interval_ms")]
    pub feature_poll_interval_ms: u64,

    /// How long to wait for the watch feed's initial cache sync before
    /// giving up fatally.
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            subscription_buffer_size: default_subscription_buffer_size(),
            shard_queue_capacity: default_shard_queue_capacity(),
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            reconcile_deadline_ms: default_reconcile_deadline_ms(),
            queue_sample_interval_ms: default_queue_sample_interval_ms(),
            change_revision_enabled: default_change_revision_enabled(),
            feature_poll_interval_ms: default_feature_poll_interval_ms(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subscription_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "subscription_buffer_size must be greater than 0".into(),
            ));
        }
        if self.shard_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "shard_queue_capacity must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_reconciles == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_reconciles must be greater than 0".into(),
            ));
        }
        if self.reconcile_deadline_ms == 0 {
            return Err(Error::InvalidConfig(
                "reconcile_deadline_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_subscription_buffer_size() -> usize {
    1000
}

fn default_shard_queue_capacity() -> usize {
    512
}

fn default_max_concurrent_reconciles() -> usize {
    16
}

fn default_reconcile_deadline_ms() -> u64 {
    120_000
}

fn default_queue_sample_interval_ms() -> u64 {
    60_000
}

fn default_change_revision_enabled() -> bool {
    true
}

fn default_feature_poll_interval_ms() -> u64 {
    10_000
}

fn default_cache_sync_timeout_ms() -> u64 {
    60_000
}
