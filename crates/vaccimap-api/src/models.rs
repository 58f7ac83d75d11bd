// Wire types for the realtime database REST and streaming API.

use serde::{Deserialize, Serialize};

/// Response body of a `POST` (push): the generated child key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushResponse {
    pub name: String,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Payload of `put` and `patch` stream events.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamPayload {
    pub path: String,
    pub data: serde_json::Value,
}

/// A data event delivered by the event stream.
///
/// `path` is relative to the location the stream was opened on and always
/// starts with `/`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The data at `path` was replaced with `data` (`null` = deleted).
    Put {
        path: String,
        data: serde_json::Value,
    },
    /// Each member of the `data` object was written below `path`.
    Patch {
        path: String,
        data: serde_json::Value,
    },
}

impl StreamEvent {
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Patch { path, .. } => path,
        }
    }
}
