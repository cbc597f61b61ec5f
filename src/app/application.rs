//! Typed model of the Application document as it travels on the wire.
//!
//! The manifest is JSON with camelCase field names; everything the engine
//! never touches is dropped on decode and left untouched on write-back,
//! since all writes go through narrow merge patches.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MANIFEST_PATHS_ANNOTATION;
use crate::AppKey;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub metadata: AppMetadata,

    /// Pending sync request. Present only while a sync is requested or
    /// running; the control loop clears it once the operation is reflected
    /// into status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,

    #[serde(default)]
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Revision the sync was requested against.
    #[serde(default)]
    pub revision: String,

    /// The source revision that introduced the content difference being
    /// synced. Written exactly once per operation instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_revision: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default)]
    pub sync: SyncStatus,

    /// Mirror of the last/current operation once the control loop has
    /// acknowledged it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_state: Option<OperationState>,

    /// Completed sync records, oldest first. Append-only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<RevisionHistory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(default)]
    pub status: SyncStatusCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatusCode {
    Synced,
    OutOfSync,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    #[serde(default)]
    pub operation: Operation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_result: Option<SyncResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    #[serde(default)]
    pub revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionHistory {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub revision: String,
}

impl Application {
    pub fn key(&self) -> AppKey {
        AppKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// The application opted into manifest-path tracking: the marker
    /// annotation is present with a non-empty value.
    pub fn tracks_manifest_paths(&self) -> bool {
        self.metadata
            .annotations
            .get(MANIFEST_PATHS_ANNOTATION)
            .map_or(false, |v| !v.is_empty())
    }

    /// A sync request is pending or running.
    pub fn has_pending_sync(&self) -> bool {
        self.operation.as_ref().is_some_and(|op| op.sync.is_some())
    }

    /// Already-recorded change revision, consulting both the pending
    /// operation and the mirrored operation state. Empty strings count as
    /// unset.
    pub fn change_revision(&self) -> Option<&str> {
        if let Some(rev) = self
            .operation
            .as_ref()
            .and_then(|op| op.sync.as_ref())
            .and_then(|sync| sync.change_revision.as_deref())
        {
            if !rev.is_empty() {
                return Some(rev);
            }
        }
        self.status
            .operation_state
            .as_ref()
            .and_then(|state| state.operation.sync.as_ref())
            .and_then(|sync| sync.change_revision.as_deref())
            .filter(|rev| !rev.is_empty())
    }

    /// Revision the pending sync operation was requested against.
    pub fn requested_revision(&self) -> Option<&str> {
        self.operation
            .as_ref()
            .and_then(|op| op.sync.as_ref())
            .map(|sync| sync.revision.as_str())
    }

    /// Result revision of the operation mirrored into status, if any.
    pub fn sync_result_revision(&self) -> Option<&str> {
        self.status
            .operation_state
            .as_ref()
            .and_then(|state| state.sync_result.as_ref())
            .map(|result| result.revision.as_str())
    }

    /// The mirrored operation state carries a sync sub-object, i.e. the
    /// operation has been promoted into status.
    pub fn operation_promoted_to_status(&self) -> bool {
        self.status
            .operation_state
            .as_ref()
            .is_some_and(|state| state.operation.sync.is_some())
    }
}
