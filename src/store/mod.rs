//! Boundary to the authoritative application store.
//!
//! The store owns the record; this engine holds only transient snapshots
//! and issues narrow merge patches against it.

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::Application;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApplicationStore: Send + Sync + 'static {
    /// Fetch the current application document by identity.
    async fn get(&self, namespace: &str, name: &str) -> Result<Application>;

    /// Apply a server-side merge patch (RFC 7386) and return the updated
    /// document. Only the fields present in `merge_patch` are touched.
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        merge_patch: serde_json::Value,
    ) -> Result<Application>;
}
