// -
// Application manifest markers

/// Annotation that opts an application into change-revision tracking.
/// The controller ignores applications without a non-empty value here.
pub const MANIFEST_PATHS_ANNOTATION: &str = "crengine.io/manifest-generate-paths";

// -
// Wire literals for watch event kinds

pub(crate) const EVENT_TYPE_ADDED: &str = "ADDED";
pub(crate) const EVENT_TYPE_MODIFIED: &str = "MODIFIED";
pub(crate) const EVENT_TYPE_DELETED: &str = "DELETED";
pub(crate) const EVENT_TYPE_BOOKMARK: &str = "BOOKMARK";

/// gRPC service name probed on the revision service before the controller
/// starts (tonic-health convention).
pub(crate) const REVISION_SERVICE_HEALTH_NAME: &str = "crengine.revision.RevisionService";
