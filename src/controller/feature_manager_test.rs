use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::FeatureManager;

fn spawn_manager(
    initial: bool,
    source: Arc<AtomicBool>,
) -> (Arc<FeatureManager>, watch::Sender<()>) {
    let manager = Arc::new(FeatureManager::new(initial, Duration::from_millis(100)));
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let task_manager = manager.clone();
    tokio::spawn(async move {
        let _ = task_manager
            .run(move || Some(source.load(Ordering::SeqCst)), shutdown_rx)
            .await;
    });
    (manager, shutdown_tx)
}

#[tokio::test(start_paused = true)]
async fn transition_requires_two_consecutive_readings() {
    let source = Arc::new(AtomicBool::new(true));
    let (manager, _shutdown_tx) = spawn_manager(true, source.clone());
    let mut rx = manager.subscribe();

    tokio::time::sleep(Duration::from_millis(50)).await;
    source.store(false, Ordering::SeqCst);

    // one divergent reading arms the gate but publishes nothing
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!rx.has_changed().unwrap());

    // the confirming reading publishes the transition
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());
}

#[tokio::test(start_paused = true)]
async fn single_flap_does_not_publish() {
    let source = Arc::new(AtomicBool::new(true));
    let (manager, _shutdown_tx) = spawn_manager(true, source.clone());
    let rx = manager.subscribe();

    tokio::time::sleep(Duration::from_millis(50)).await;
    // flips off for one poll window, then back on
    source.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    source.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!rx.has_changed().unwrap(), "flap must not reach consumers");
    assert!(manager.is_enabled());
}

#[tokio::test]
async fn set_enabled_publishes_immediately() {
    let manager = FeatureManager::new(true, Duration::from_millis(100));
    let mut rx = manager.subscribe();

    manager.set_enabled(false);
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());

    // idempotent writes do not wake consumers
    manager.set_enabled(false);
    assert!(!rx.has_changed().unwrap());
}
