use serde::Deserialize;
use serde::Serialize;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of retries (0 means unlimited retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Divide strategies by business domain
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    /// Initial connect to the application store / watch feed
    #[serde(default = "default_connect_policy")]
    pub connect: BackoffPolicy,

    /// Revision-service health probe before the controller starts
    #[serde(default = "default_healthcheck_policy")]
    pub healthcheck: BackoffPolicy,

    /// Watch stream re-establishment after a server-side close
    #[serde(default = "default_watch_policy")]
    pub watch: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            connect: default_connect_policy(),
            healthcheck: default_healthcheck_policy(),
            watch: default_watch_policy(),
        }
    }
}

fn default_connect_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        timeout_ms: 1_000,
        base_delay_ms: 500,
        max_delay_ms: 10_000,
    }
}

fn default_healthcheck_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 30,
        timeout_ms: 1_000,
        base_delay_ms: 1_000,
        max_delay_ms: 10_000,
    }
}

fn default_watch_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        timeout_ms: 5_000,
        base_delay_ms: 500,
        max_delay_ms: 30_000,
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_op_timeout_ms() -> u64 {
    100
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    1000
}
