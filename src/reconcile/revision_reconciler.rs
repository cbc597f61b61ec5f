//! Computes and persists the change revision of a sync operation.
//!
//! One invocation walks a fixed sequence: re-read the application, gate on
//! a pending sync and on the revision not being recorded yet, derive the
//! revision pair, ask the diff service, re-read, then merge-patch the one
//! leaf field in whichever location the operation currently lives.

use std::sync::Arc;

use autometrics::autometrics;
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use tonic::async_trait;
use tracing::debug;
use tracing::info;

use super::KeyedLocks;
use crate::metrics::CHANGE_REVISION_PATCH_METRIC;
use crate::AppKey;
use crate::Application;
use crate::ApplicationStore;
use crate::ChangeRevisionRequest;
use crate::Result;
use crate::RevisionDiffService;
use crate::SyncStatusCode;
use crate::API_SLO;

/// Where the change revision was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    /// The pending top-level operation.
    Operation,
    /// The operation mirrored into status.
    OperationState,
}

impl PatchTarget {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Operation => "operation",
            Self::OperationState => "operation_state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The change revision was computed and written back.
    Patched {
        revision: String,
        target: PatchTarget,
    },
    /// Nothing to do: no pending sync, revision already recorded, or
    /// nothing to diff against.
    Skipped,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChangeRevisionReconciler: Send + Sync + 'static {
    async fn reconcile(&self, application: &Application) -> Result<ReconcileOutcome>;
}

pub struct RevisionReconciler<S, D>
where
    S: ApplicationStore,
    D: RevisionDiffService,
{
    store: Arc<S>,
    diff_service: Arc<D>,
    locks: KeyedLocks,
}

impl<S, D> RevisionReconciler<S, D>
where
    S: ApplicationStore,
    D: RevisionDiffService,
{
    pub fn new(store: Arc<S>, diff_service: Arc<D>) -> Self {
        Self {
            store,
            diff_service,
            locks: KeyedLocks::new(),
        }
    }

    async fn calculate_revision(&self, app: &Application) -> Result<Option<String>> {
        let Some((current_revision, previous_revision)) = revision_pair(app) else {
            return Ok(None);
        };

        let result = self
            .diff_service
            .get_change_revision(ChangeRevisionRequest {
                app_name: app.metadata.name.clone(),
                namespace: app.metadata.namespace.clone(),
                current_revision,
                previous_revision,
            })
            .await?;

        Ok(result.filter(|revision| !revision.is_empty()))
    }

    async fn patch_operation(&self, key: &AppKey, revision: &str) -> Result<()> {
        let patch = json!({
            "operation": {
                "sync": {
                    "changeRevision": revision,
                },
            },
        });
        self.store.patch(&key.namespace, &key.name, patch).await?;
        Ok(())
    }

    async fn patch_operation_state(&self, key: &AppKey, revision: &str) -> Result<()> {
        let patch = json!({
            "status": {
                "operationState": {
                    "operation": {
                        "sync": {
                            "changeRevision": revision,
                        },
                    },
                },
            },
        });
        self.store.patch(&key.namespace, &key.name, patch).await?;
        Ok(())
    }
}

#[async_trait]
impl<S, D> ChangeRevisionReconciler for RevisionReconciler<S, D>
where
    S: ApplicationStore,
    D: RevisionDiffService,
{
    #[autometrics(objective = API_SLO)]
    async fn reconcile(&self, application: &Application) -> Result<ReconcileOutcome> {
        let key = application.key();
        // Two concurrent triggers for one application must not both decide
        // "not yet computed"; unrelated applications stay unaffected.
        let _guard = self.locks.acquire(&key).await;

        // Never trust the snapshot that triggered the call; it may be
        // stale relative to concurrent writers.
        let app = self.store.get(&key.namespace, &key.name).await?;

        if !app.has_pending_sync() {
            return Ok(ReconcileOutcome::Skipped);
        }

        if app.change_revision().is_some() {
            info!(application = %key, "change revision already calculated");
            return Ok(ReconcileOutcome::Skipped);
        }

        info!(application = %key, "calculating change revision");

        let Some(revision) = self.calculate_revision(&app).await? else {
            info!(application = %key, "no change revision to record");
            return Ok(ReconcileOutcome::Skipped);
        };

        info!(application = %key, revision = %revision, "change revision calculated");

        // Re-read right before writing: pick up the latest state and the
        // possible promotion of the operation into status.
        let app = self.store.get(&key.namespace, &key.name).await?;

        let target = if app.operation_promoted_to_status() {
            debug!(application = %key, "patching operation state");
            self.patch_operation_state(&key, &revision).await?;
            PatchTarget::OperationState
        } else {
            debug!(application = %key, "patching operation");
            self.patch_operation(&key, &revision).await?;
            PatchTarget::Operation
        };

        CHANGE_REVISION_PATCH_METRIC
            .with_label_values(&[target.as_label()])
            .inc();

        Ok(ReconcileOutcome::Patched { revision, target })
    }
}

/// Derive the (current, previous) revision pair to hand to the diff
/// service. `None` means there is nothing to diff against and the
/// invocation is a no-op.
pub(crate) fn revision_pair(app: &Application) -> Option<(String, String)> {
    let history = &app.status.history;
    if history.is_empty() {
        // first sync operation; no prior revision exists
        return None;
    }

    if app.status.sync.status == SyncStatusCode::Synced {
        // sync already finished: diff the recorded result against the
        // entry immediately preceding it
        if history.len() < 2 {
            return None;
        }
        let current = app.sync_result_revision().unwrap_or_default().to_string();
        let previous = history[history.len() - 2].revision.clone();
        return Some((current, previous));
    }

    // sync still in progress: diff the requested revision against the
    // latest completed record
    let current = app.requested_revision().unwrap_or_default().to_string();
    let previous = history[history.len() - 1].revision.clone();
    Some((current, previous))
}
