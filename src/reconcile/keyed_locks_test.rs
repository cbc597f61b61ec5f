use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::keyed_locks::KeyedLocks;
use crate::AppKey;

#[tokio::test]
async fn same_key_is_mutually_exclusive() {
    let locks = Arc::new(KeyedLocks::new());
    let key = AppKey::new("default", "guestbook");
    let entered = Arc::new(AtomicUsize::new(0));

    let guard = locks.acquire(&key).await;

    let locks2 = locks.clone();
    let key2 = key.clone();
    let entered2 = entered.clone();
    let contender = tokio::spawn(async move {
        let _guard = locks2.acquire(&key2).await;
        entered2.store(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        entered.load(Ordering::SeqCst),
        0,
        "second holder must wait for the first"
    );

    drop(guard);
    contender.await.expect("contender should finish");
    assert_eq!(entered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_keys_do_not_serialize() {
    let locks = Arc::new(KeyedLocks::new());
    let guard_a = locks.acquire(&AppKey::new("default", "a")).await;

    // acquiring an unrelated key completes immediately even while "a" is
    // held
    let guard_b = tokio::time::timeout(
        Duration::from_millis(100),
        locks.acquire(&AppKey::new("default", "b")),
    )
    .await
    .expect("unrelated key must not block");

    drop(guard_a);
    drop(guard_b);
}

#[tokio::test]
async fn entries_are_removed_when_the_last_holder_leaves() {
    let locks = Arc::new(KeyedLocks::new());
    let key = AppKey::new("default", "guestbook");

    let guard = locks.acquire(&key).await;
    assert_eq!(locks.len(), 1);

    let locks2 = locks.clone();
    let key2 = key.clone();
    let contender = tokio::spawn(async move {
        let _guard = locks2.acquire(&key2).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(guard);
    contender.await.expect("contender should finish");

    assert_eq!(locks.len(), 0, "map must not grow with applications seen");
}
