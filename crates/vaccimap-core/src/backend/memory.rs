// ── In-process backend ──
//
// Keeps both collections as JSON trees laid out exactly like the hosted
// database and replays writes to listeners as path-addressed events, so
// subscribers go through the same `ChildTracker` logic as in production.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaccimap_api::StreamEvent;

use super::{FEED_CHANNEL_SIZE, RemoteStore, StoreFuture};
use crate::convert::{decode_comments, encode_site_data, keys};
use crate::error::CoreError;
use crate::feed::{ChildTracker, FeedEvent, set_path, split_path};
use crate::model::{Comment, CommentId, CoordinateKey, SiteKind, SiteRecord};

const BROADCAST_CAPACITY: usize = 1024;

#[derive(Default)]
struct State {
    trees: BTreeMap<SiteKind, Value>,
    /// When set, every write fails with this message.
    reject_writes: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    events: broadcast::Sender<(SiteKind, StreamEvent)>,
    push_counter: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, kind: SiteKind) -> Value {
        self.lock().trees.get(&kind).cloned().unwrap_or(Value::Null)
    }
}

/// [`RemoteStore`] held entirely in memory. Cheap to clone; clones share
/// the same data.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                events,
                push_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Write any JSON value at a path below a collection, bypassing
    /// validation. `path` is `/`-separated and relative to the collection.
    pub fn put_raw(&self, kind: SiteKind, path: &str, value: Value) {
        self.write_path(kind, &split_path(path), value);
    }

    /// The whole collection tree for `kind` (`null` when empty).
    pub fn collection(&self, kind: SiteKind) -> Value {
        self.shared.snapshot(kind)
    }

    /// Make every subsequent write fail (or succeed again with `None`).
    pub fn set_reject_writes(&self, message: Option<String>) {
        self.shared.lock().reject_writes = message;
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn check_writable(&self) -> Result<(), CoreError> {
        match &self.shared.lock().reject_writes {
            Some(message) => Err(CoreError::WriteFailed {
                message: message.clone(),
                status: None,
            }),
            None => Ok(()),
        }
    }

    /// Apply a write and broadcast it while still holding the lock, so
    /// listeners observe writes in commit order.
    fn write_path(&self, kind: SiteKind, segments: &[String], value: Value) {
        let mut state = self.shared.lock();
        let tree = state.trees.entry(kind).or_insert(Value::Null);
        set_path(tree, segments, value.clone());

        let path = format!("/{}", segments.join("/"));
        debug!(?kind, %path, "memory write");
        // No receivers is fine.
        let _ = self
            .shared
            .events
            .send((kind, StreamEvent::Put { path, data: value }));
    }

    fn next_push_id(&self) -> String {
        let n = self.shared.push_counter.fetch_add(1, Ordering::Relaxed);
        format!("-M{n:018}")
    }
}

fn segments(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

impl RemoteStore for MemoryStore {
    fn listen(
        &self,
        kind: SiteKind,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<FeedEvent>, CoreError> {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_SIZE);

        // Subscribe and snapshot under one lock so no write falls between.
        let (initial, mut updates) = {
            let state = self.shared.lock();
            let initial = state.trees.get(&kind).cloned().unwrap_or(Value::Null);
            (initial, self.shared.events.subscribe())
        };
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let mut tracker = ChildTracker::new();
            let mut pending = tracker.apply(StreamEvent::Put {
                path: "/".into(),
                data: initial,
            });

            'outer: loop {
                for event in pending.drain(..) {
                    if tx.send(event).await.is_err() {
                        break 'outer;
                    }
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    update = updates.recv() => match update {
                        Ok((k, event)) if k == kind => pending = tracker.apply(event),
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(?kind, skipped, "listener lagged, replaying collection");
                            pending = tracker.apply(StreamEvent::Put {
                                path: "/".into(),
                                data: shared.snapshot(kind),
                            });
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(rx)
    }

    fn write_site<'a>(&'a self, record: &'a SiteRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_writable()?;
            self.write_path(
                record.collection,
                &segments(&[record.coordinate_key.as_str(), keys::SITE_DATA]),
                encode_site_data(record),
            );
            Ok(())
        })
    }

    fn delete_site<'a>(&'a self, kind: SiteKind, key: &'a CoordinateKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_writable()?;
            self.write_path(kind, &segments(&[key.as_str()]), Value::Null);
            Ok(())
        })
    }

    fn delete_site_data<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_writable()?;
            self.write_path(
                kind,
                &segments(&[key.as_str(), keys::SITE_DATA]),
                Value::Null,
            );
            Ok(())
        })
    }

    fn push_comment<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
        text: &'a str,
    ) -> StoreFuture<'a, CommentId> {
        Box::pin(async move {
            self.check_writable()?;
            let id = self.next_push_id();
            self.write_path(
                kind,
                &segments(&[key.as_str(), keys::COMMENTS, id.as_str()]),
                Value::String(text.to_owned()),
            );
            Ok(CommentId::new(id))
        })
    }

    fn read_comments<'a>(
        &'a self,
        kind: SiteKind,
        key: &'a CoordinateKey,
    ) -> StoreFuture<'a, Vec<Comment>> {
        Box::pin(async move {
            let tree = self.shared.snapshot(kind);
            let raw = tree
                .get(key.as_str())
                .and_then(|node| node.get(keys::COMMENTS))
                .cloned();
            Ok(decode_comments(raw))
        })
    }
}
