// ── Comment store adapter ──

use tracing::debug;

use crate::backend::RemoteStore;
use crate::error::CoreError;
use crate::model::{Comment, CoordinateKey, SiteKind};

/// Trim `text` and reject it when nothing is left.
pub fn normalize_comment(text: &str) -> Result<&str, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "comment text is empty".into(),
        });
    }
    Ok(trimmed)
}

/// Append a comment to a site and return it with its server-assigned id.
pub async fn add_comment(
    store: &dyn RemoteStore,
    kind: SiteKind,
    key: &CoordinateKey,
    text: &str,
) -> Result<Comment, CoreError> {
    let text = normalize_comment(text)?;
    let id = store.push_comment(kind, key, text).await?;
    debug!(%key, %id, "comment added");
    Ok(Comment {
        id,
        text: text.to_owned(),
    })
}

/// Read a site's comments once, oldest first.
pub async fn comments(
    store: &dyn RemoteStore,
    kind: SiteKind,
    key: &CoordinateKey,
) -> Result<Vec<Comment>, CoreError> {
    store.read_comments(kind, key).await
}
