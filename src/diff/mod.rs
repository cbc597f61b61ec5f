//! Boundary to the remote revision-diff computation service.

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRevisionRequest {
    pub app_name: String,
    pub namespace: String,
    pub current_revision: String,
    pub previous_revision: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RevisionDiffService: Send + Sync + 'static {
    /// Resolve the revision that introduced the content difference between
    /// the two revisions. `None` when nothing is attributable. Treated as
    /// slow and fallible; errors mean no state is written.
    async fn get_change_revision(
        &self,
        request: ChangeRevisionRequest,
    ) -> Result<Option<String>>;
}
