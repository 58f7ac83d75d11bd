// ── Remote change feed ──
//
// A collection's change feed is three channels (added, changed, removed)
// keyed by child name, plus a marker once the initial replay is complete.
// `ChildTracker` derives them from the database's path-addressed
// put/patch stream; `FeedListener` applies them to the registry.

mod listener;
mod tracker;

use serde_json::Value;

pub use listener::FeedListener;
pub use tracker::ChildTracker;
pub(crate) use tracker::{set_path, split_path};

/// One change to a direct child of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, value: Value },
    Changed { key: String, value: Value },
    /// Carries the last value known before removal.
    Removed { key: String, value: Value },
}

impl ChildEvent {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Changed { key, .. } | Self::Removed { key, .. } => key,
        }
    }
}

/// An item delivered by a collection subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Child(ChildEvent),
    /// Every child that existed when the subscription started has been
    /// delivered.
    Synced,
}
