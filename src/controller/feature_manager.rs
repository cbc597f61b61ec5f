//! Runtime on/off switch for the change-revision controller.
//!
//! The settings source offers no push notifications, so the gate polls at
//! an explicit interval. A transition is published only after two
//! consecutive readings agree against the current state, which keeps a
//! flapping source from bouncing the controller. Consumers observe
//! transitions through a watch channel and never see the individual poll
//! ticks.

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use crate::Error;
use crate::Result;

pub struct FeatureManager {
    tx: watch::Sender<bool>,
    poll_interval: Duration,
}

impl FeatureManager {
    pub fn new(initial: bool, poll_interval: Duration) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx, poll_interval }
    }

    /// Current state plus future transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Push-based override; bypasses the poll hysteresis.
    pub fn set_enabled(&self, enabled: bool) {
        self.tx.send_if_modified(|current| {
            if *current == enabled {
                return false;
            }
            *current = enabled;
            true
        });
    }

    /// Poll `read` until shutdown. `None` readings (source unavailable)
    /// keep the current state and reset the hysteresis window.
    pub async fn run<F>(&self, read: F, mut shutdown_signal: watch::Receiver<()>) -> Result<()>
    where
        F: Fn() -> Option<bool> + Send + Sync,
    {
        let mut pending: Option<bool> = None;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    warn!("feature gate shutting down");
                    return Err(Error::Exit);
                }

                _ = ticker.tick() => {
                    let Some(observed) = read() else {
                        pending = None;
                        continue;
                    };
                    if observed == *self.tx.borrow() {
                        pending = None;
                        continue;
                    }
                    match pending.take() {
                        // second consecutive reading confirms the change
                        Some(previous) if previous == observed => {
                            info!(enabled = observed, "feature gate transition");
                            let _ = self.tx.send(observed);
                        }
                        _ => {
                            pending = Some(observed);
                        }
                    }
                }
            }
        }
    }
}
