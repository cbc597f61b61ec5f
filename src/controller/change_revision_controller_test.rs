use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tonic::async_trait;

use super::*;
use crate::constants::MANIFEST_PATHS_ANNOTATION;
use crate::Application;
use crate::Broadcaster;
use crate::ChangeRevisionReconciler;
use crate::ControllerConfig;
use crate::Operation;
use crate::ReconcileOutcome;
use crate::Result;
use crate::SyncOperation;

struct FakeReconciler {
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl FakeReconciler {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(vec![]),
            delay,
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChangeRevisionReconciler for FakeReconciler {
    async fn reconcile(&self, application: &Application) -> Result<ReconcileOutcome> {
        self.calls.lock().push(application.key().to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ReconcileOutcome::Skipped)
    }
}

fn tracked_app(name: &str) -> Application {
    let mut app = Application::default();
    app.metadata.namespace = "default".into();
    app.metadata.name = name.into();
    app.metadata
        .annotations
        .insert(MANIFEST_PATHS_ANNOTATION.into(), ".".into());
    app.operation = Some(Operation {
        sync: Some(SyncOperation {
            revision: "c732f4d".into(),
            change_revision: None,
        }),
    });
    app
}

fn test_config(deadline_ms: u64) -> ControllerConfig {
    ControllerConfig {
        reconcile_deadline_ms: deadline_ms,
        ..ControllerConfig::default()
    }
}

fn start_controller(
    reconciler: Arc<FakeReconciler>,
    config: ControllerConfig,
) -> (Arc<Broadcaster>, watch::Sender<()>) {
    let broadcaster = Broadcaster::new();
    let controller = ChangeRevisionController::new(broadcaster.clone(), reconciler, config);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        let _ = controller.run(shutdown_rx).await;
    });
    (broadcaster, shutdown_tx)
}

async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn eligible_events_reach_the_reconciler() {
    let reconciler = FakeReconciler::new(Duration::ZERO);
    let (broadcaster, _shutdown_tx) = start_controller(reconciler.clone(), test_config(1000));
    // give the controller loop time to subscribe
    tokio::time::sleep(Duration::from_millis(20)).await;

    broadcaster.on_update(None, tracked_app("guestbook"));

    wait_until(|| !reconciler.calls().is_empty()).await;
    assert_eq!(reconciler.calls(), vec!["default/guestbook".to_string()]);
}

#[tokio::test]
async fn ineligible_events_are_filtered_before_the_reconciler() {
    let reconciler = FakeReconciler::new(Duration::ZERO);
    let (broadcaster, _shutdown_tx) = start_controller(reconciler.clone(), test_config(1000));
    tokio::time::sleep(Duration::from_millis(20)).await;

    // bookmark: no state change
    broadcaster.on_bookmark();

    // tracked but no pending sync
    let mut no_sync = tracked_app("no-sync");
    no_sync.operation = None;
    broadcaster.on_update(None, no_sync);

    // pending sync but not tracked
    let mut untracked = tracked_app("untracked");
    untracked.metadata.annotations.clear();
    broadcaster.on_update(None, untracked);

    // a single eligible event proves the loop is alive and everything
    // above was filtered, not merely still queued
    broadcaster.on_update(None, tracked_app("eligible"));

    wait_until(|| !reconciler.calls().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(reconciler.calls(), vec!["default/eligible".to_string()]);
}

#[tokio::test]
async fn deadline_frees_the_worker_for_the_next_event() {
    // every reconcile hangs well past the 100ms deadline
    let reconciler = FakeReconciler::new(Duration::from_secs(60));
    let (broadcaster, _shutdown_tx) = start_controller(reconciler.clone(), test_config(100));
    tokio::time::sleep(Duration::from_millis(20)).await;

    broadcaster.on_update(None, tracked_app("guestbook"));
    broadcaster.on_update(None, tracked_app("guestbook"));

    // the first deadline expiry cancels the hung call and the same
    // application's next event still gets its turn
    wait_until(|| reconciler.calls().len() == 2).await;
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let reconciler = FakeReconciler::new(Duration::ZERO);
    let (broadcaster, shutdown_tx) = start_controller(reconciler.clone(), test_config(1000));
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown_tx.send(()).expect("Should succeed to send shutdown");
    tokio::time::sleep(Duration::from_millis(50)).await;

    broadcaster.on_update(None, tracked_app("guestbook"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reconciler.calls().is_empty());
}
