use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::EVENT_TYPE_ADDED;
use crate::constants::EVENT_TYPE_BOOKMARK;
use crate::constants::EVENT_TYPE_DELETED;
use crate::constants::EVENT_TYPE_MODIFIED;
use crate::Application;

/// Kind of a watch notification. `Bookmark` carries no entity-state change
/// and is dropped before any processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
}

impl WatchEventType {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            EVENT_TYPE_ADDED => Some(Self::Added),
            EVENT_TYPE_MODIFIED => Some(Self::Modified),
            EVENT_TYPE_DELETED => Some(Self::Deleted),
            EVENT_TYPE_BOOKMARK => Some(Self::Bookmark),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Added => EVENT_TYPE_ADDED,
            Self::Modified => EVENT_TYPE_MODIFIED,
            Self::Deleted => EVENT_TYPE_DELETED,
            Self::Bookmark => EVENT_TYPE_BOOKMARK,
        }
    }
}

impl fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One observed mutation of an application, as delivered by the watch
/// layer. The snapshot is immutable once delivered; writes go against the
/// authoritative store only.
#[derive(Debug, Clone)]
pub struct ApplicationWatchEvent {
    pub event_type: WatchEventType,
    pub application: Application,
}

impl ApplicationWatchEvent {
    pub fn new(event_type: WatchEventType, application: Application) -> Self {
        Self {
            event_type,
            application,
        }
    }
}

/// Identity of an application: (namespace, name), unique across the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppKey {
    pub namespace: String,
    pub name: String,
}

impl AppKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
