use std::sync::Arc;

use mockall::predicate::*;
use mockall::Sequence;
use serde_json::json;

use super::*;
use crate::store::MockApplicationStore;
use crate::Application;
use crate::Error;
use crate::MockRevisionDiffService;
use crate::NetworkError;
use crate::Operation;
use crate::OperationState;
use crate::RevisionHistory;
use crate::SyncOperation;
use crate::SyncResult;
use crate::SyncStatusCode;

fn base_app() -> Application {
    let mut app = Application::default();
    app.metadata.namespace = "default".into();
    app.metadata.name = "guestbook".into();
    app
}

fn pending_app(requested: &str, history: &[(i64, &str)]) -> Application {
    let mut app = base_app();
    app.operation = Some(Operation {
        sync: Some(SyncOperation {
            revision: requested.into(),
            change_revision: None,
        }),
    });
    app.status.history = history
        .iter()
        .map(|(id, rev)| RevisionHistory {
            id: *id,
            revision: (*rev).into(),
        })
        .collect();
    app
}

fn synced_app(result: &str, history: &[(i64, &str)]) -> Application {
    let mut app = pending_app(result, history);
    app.status.sync.status = SyncStatusCode::Synced;
    app.status.operation_state = Some(OperationState {
        operation: Operation::default(),
        sync_result: Some(SyncResult {
            revision: result.into(),
        }),
    });
    app
}

fn with_recorded_revision(mut app: Application, revision: &str) -> Application {
    if let Some(sync) = app.operation.as_mut().and_then(|op| op.sync.as_mut()) {
        sync.change_revision = Some(revision.into());
    }
    app
}

fn reconciler(
    store: MockApplicationStore,
    diff: MockRevisionDiffService,
) -> RevisionReconciler<MockApplicationStore, MockRevisionDiffService> {
    RevisionReconciler::new(Arc::new(store), Arc::new(diff))
}

#[tokio::test]
async fn no_pending_sync_is_a_noop() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .with(eq("default"), eq("guestbook"))
        .times(1)
        .returning(|_, _| Ok(base_app()));
    store.expect_patch().times(0);

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision().times(0);

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn empty_history_never_calls_the_diff_service() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(pending_app("c732f4d", &[])));
    store.expect_patch().times(0);

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision().times(0);

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
}

// Two back-to-back invocations with no intervening state change must
// produce exactly one write.
#[tokio::test]
async fn second_invocation_skips_after_the_revision_is_recorded() {
    let mut store = MockApplicationStore::new();
    let mut seq = Sequence::new();

    // first invocation: fetch, fetch-before-write, patch
    store
        .expect_get()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(pending_app("c732f4d", &[(1, "b21a5ee")])));
    store
        .expect_patch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok(with_recorded_revision(
                pending_app("c732f4d", &[(1, "b21a5ee")]),
                "d4f0c11",
            ))
        });
    // second invocation observes the recorded revision and stops
    store
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            Ok(with_recorded_revision(
                pending_app("c732f4d", &[(1, "b21a5ee")]),
                "d4f0c11",
            ))
        });

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .times(1)
        .returning(|_| Ok(Some("d4f0c11".into())));

    let reconciler = reconciler(store, diff);
    let first = reconciler.reconcile(&base_app()).await.unwrap();
    assert_eq!(
        first,
        ReconcileOutcome::Patched {
            revision: "d4f0c11".into(),
            target: PatchTarget::Operation,
        }
    );

    let second = reconciler.reconcile(&base_app()).await.unwrap();
    assert_eq!(second, ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn in_progress_sync_diffs_requested_against_latest_history() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .returning(|_, _| Ok(pending_app("c", &[(1, "a")])));
    store
        .expect_patch()
        .times(1)
        .returning(|_, _, _| Ok(base_app()));

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .with(eq(crate::ChangeRevisionRequest {
            app_name: "guestbook".into(),
            namespace: "default".into(),
            current_revision: "c".into(),
            previous_revision: "a".into(),
        }))
        .times(1)
        .returning(|_| Ok(Some("d".into())));

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Patched { .. }));
}

#[tokio::test]
async fn synced_sync_diffs_result_against_previous_history_entry() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .returning(|_, _| Ok(synced_app("b", &[(1, "a"), (2, "b")])));
    store
        .expect_patch()
        .times(1)
        .returning(|_, _, _| Ok(base_app()));

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .with(eq(crate::ChangeRevisionRequest {
            app_name: "guestbook".into(),
            namespace: "default".into(),
            current_revision: "b".into(),
            previous_revision: "a".into(),
        }))
        .times(1)
        .returning(|_| Ok(Some("d".into())));

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Patched { .. }));
}

#[tokio::test]
async fn patch_targets_the_operation_when_not_promoted() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .returning(|_, _| Ok(pending_app("c", &[(1, "a")])));
    store
        .expect_patch()
        .withf(|namespace, name, patch| {
            namespace == "default"
                && name == "guestbook"
                && *patch == json!({"operation": {"sync": {"changeRevision": "d"}}})
        })
        .times(1)
        .returning(|_, _, _| Ok(base_app()));

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .returning(|_| Ok(Some("d".into())));

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Patched {
            revision: "d".into(),
            target: PatchTarget::Operation,
        }
    );
}

#[tokio::test]
async fn patch_targets_the_operation_state_once_promoted() {
    let mut seq = Sequence::new();
    let mut store = MockApplicationStore::new();
    // fresh read sees the pending operation...
    store
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(pending_app("c", &[(1, "a")])));
    // ...but by the pre-write read it was promoted into status
    store
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            let mut app = pending_app("c", &[(1, "a")]);
            app.status.operation_state = Some(OperationState {
                operation: Operation {
                    sync: Some(SyncOperation {
                        revision: "c".into(),
                        change_revision: None,
                    }),
                },
                sync_result: None,
            });
            Ok(app)
        });
    store
        .expect_patch()
        .withf(|_, _, patch| {
            *patch
                == json!({
                    "status": {
                        "operationState": {
                            "operation": {"sync": {"changeRevision": "d"}}
                        }
                    }
                })
        })
        .times(1)
        .returning(|_, _, _| Ok(base_app()));

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .returning(|_| Ok(Some("d".into())));

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Patched {
            revision: "d".into(),
            target: PatchTarget::OperationState,
        }
    );
}

#[tokio::test]
async fn diff_service_failure_writes_nothing() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(pending_app("c", &[(1, "a")])));
    store.expect_patch().times(0);

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .times(1)
        .returning(|_| Err(Error::Network(NetworkError::ConnectError)));

    let result = reconciler(store, diff).reconcile(&base_app()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_diff_result_is_a_noop() {
    let mut store = MockApplicationStore::new();
    store
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(pending_app("c", &[(1, "a")])));
    store.expect_patch().times(0);

    let mut diff = MockRevisionDiffService::new();
    diff.expect_get_change_revision()
        .times(1)
        .returning(|_| Ok(Some(String::new())));

    let outcome = reconciler(store, diff)
        .reconcile(&base_app())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);
}

#[test]
fn revision_pair_empty_history_has_nothing_to_diff() {
    assert_eq!(revision_pair(&pending_app("c", &[])), None);
}

#[test]
fn revision_pair_in_progress_uses_latest_history_entry() {
    let app = pending_app("c", &[(1, "a")]);
    assert_eq!(revision_pair(&app), Some(("c".into(), "a".into())));
}

#[test]
fn revision_pair_synced_uses_second_to_last_entry() {
    let app = synced_app("b", &[(1, "a"), (2, "b")]);
    assert_eq!(revision_pair(&app), Some(("b".into(), "a".into())));
}

#[test]
fn revision_pair_synced_with_single_record_has_nothing_to_diff() {
    let app = synced_app("b", &[(1, "b")]);
    assert_eq!(revision_pair(&app), None);
}
