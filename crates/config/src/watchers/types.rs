//! Watcher-specific types and events

use crate::core::ConfigResult;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A change reported by a watchable provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// What happened to the watched resource
    pub kind: WatchEventKind,

    /// Name of the provider that observed the change
    pub provider: String,

    /// File path (if applicable)
    pub path: Option<PathBuf>,

    /// Backend key (if applicable)
    pub key: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl WatchEvent {
    /// Create a new watch event
    pub fn new(kind: WatchEventKind, provider: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            path: None,
            key: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the path
    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Watch event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventKind {
    /// Resource created
    Created,

    /// Resource content modified
    Modified,

    /// A symlink now points at different content
    Retargeted,

    /// Other event
    Other(String),
}

/// What a provider hands to its watch callback: a change or a failure
pub type WatchNotification = ConfigResult<WatchEvent>;

/// Callback registered through [`Watchable::watch`](crate::core::Watchable::watch)
///
/// The returned future is awaited by the provider's delivery task before the
/// next notification is handed over.
pub type WatchCallback = Arc<dyn Fn(WatchNotification) -> BoxFuture<'static, ()> + Send + Sync>;
