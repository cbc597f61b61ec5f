use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::NetworkError;
use crate::Result;

/// Run `task` under the policy's per-attempt timeout, retrying with
/// exponential backoff and jitter. `max_retries == 0` retries forever.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: &BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut retries = 0;

    loop {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r);
            }
            Ok(Err(error)) => {
                warn!("task attempt failed with error: {:?}", &error);
            }
            Err(_) => {
                warn!(
                    "task attempt timed out after {:?}",
                    timeout_duration
                );
            }
        }

        retries += 1;
        if policy.max_retries != 0 && retries >= policy.max_retries {
            warn!("Task failed after {} retries", retries);
            return Err(NetworkError::RetryTimeout(timeout_duration).into());
        }

        sleep(with_jitter(delay)).await;
        delay = std::cmp::min(delay * 2, max_delay);
    }
}

// Deciles either side of the nominal delay keep concurrent retries from
// synchronizing.
fn with_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.9..1.1);
    delay.mul_f64(factor)
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) async fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!(
                "spawned task: {name} stopped or encountered an error: {:?}",
                e
            );
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
