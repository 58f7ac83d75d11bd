// ── Remote store abstraction ──
//
// Everything the core needs from the database, expressed in domain
// terms. `RealtimeStore` talks to the hosted database; `MemoryStore`
// keeps the same layout in process.

mod memory;
mod realtime;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::feed::FeedEvent;
use crate::model::{Comment, CommentId, CoordinateKey, SiteKind, SiteRecord};

pub use memory::MemoryStore;
pub use realtime::RealtimeStore;

/// Buffer between a collection stream and its subscriber.
pub(crate) const FEED_CHANNEL_SIZE: usize = 256;

/// Future returned by [`RemoteStore`] operations.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, CoreError>>;

/// Access to the remote collections.
///
/// Writes resolve once the database acknowledged them and never touch
/// local state; the change feed reports their effect.
pub trait RemoteStore: Send + Sync + 'static {
    /// Start streaming the collection for `kind` as child events.
    ///
    /// The stream begins with a full replay followed by
    /// [`FeedEvent::Synced`] and runs until `cancel` fires. Must be
    /// called from within a Tokio runtime.
    fn listen(
        &self,
        kind: SiteKind,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<FeedEvent>, CoreError>;

    /// Overwrite the `site data` of the record's node in the collection
    /// for its kind.
    fn write_site<'a>(&'a self, record: &'a SiteRecord) -> StoreFuture<'a, ()>;

    /// Delete a whole site node, comments included.
    fn delete_site<'a>(&'a self, kind: SiteKind, key: &'a CoordinateKey) -> StoreFuture<'a, ()>;

    /// Delete only a site's `site data`, leaving its comments.
    fn delete_site_data<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, ()>;

    /// Append a comment under a server-generated id.
    fn push_comment<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
        text: &'a str,
    ) -> StoreFuture<'a, CommentId>;

    /// Read a site's comments once, ordered by id.
    fn read_comments<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, Vec<Comment>>;
}
