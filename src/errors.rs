//! Change-Revision Engine Error Hierarchy
//!
//! Defines error types for the event-distribution and reconciliation
//! pipeline, categorized by operational concern: configuration, network
//! transport, store access, and reconciliation outcomes.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings validation and deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Semantically invalid settings values
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Transport-level failures (gRPC connect, watch stream)
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Failures while reconciling a single application's change revision
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Version-config lookup failures
    #[error(transparent)]
    VersionConfig(#[from] VersionConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Graceful-shutdown unwinding of run loops
    #[error("Exit")]
    Exit,
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Endpoint unavailable (HTTP 503 equivalent)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed endpoint addresses
    #[error("Invalid URI format: {0}")]
    InvalidUri(String),

    /// Persistent connection failures
    #[error("Socket connect failed error")]
    ConnectError,

    /// Retry policy exhaustion
    #[error("Retry timeout after {0:?}")]
    RetryTimeout(Duration),

    /// The server closed a long-lived watch stream
    #[error("Watch stream closed by server")]
    WatchStreamClosed,

    /// gRPC transport layer errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),

    /// gRPC status code errors
    #[error(transparent)]
    TonicStatusError(#[from] Box<tonic::Status>),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Fetch/patch failures against the authoritative store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote diff-computation failures; no state is written
    #[error(transparent)]
    DiffService(#[from] DiffServiceError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Application {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("Malformed application manifest: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store request failed: {0}")]
    Rpc(#[source] Box<tonic::Status>),
}

#[derive(Debug, thiserror::Error)]
pub enum DiffServiceError {
    #[error("Change-revision request failed: {0}")]
    Rpc(#[source] Box<tonic::Status>),
}

#[derive(Debug, thiserror::Error)]
pub enum VersionConfigError {
    #[error("Unknown version-config provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to read version config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed version config: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Version-config request failed: {0}")]
    Rpc(#[source] Box<tonic::Status>),
}
