// ── Feed listener ──
//
// Owns one subscription slot per collection and a single applier task.
// Forwarding tasks tag every event with the generation of the
// subscription that produced it; the applier drops events whose
// generation is no longer live, so a revoked subscription can never
// write into the registry after its replacement was issued.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{ChildEvent, FeedEvent};
use crate::backend::RemoteStore;
use crate::convert::decode_child;
use crate::error::CoreError;
use crate::model::{CoordinateKey, SiteKind};
use crate::store::SiteRegistry;

const APPLY_CHANNEL_SIZE: usize = 1024;

/// Message to the applier task.
enum Apply {
    Event {
        kind: SiteKind,
        generation: u64,
        event: FeedEvent,
    },
    /// Clear the registry, acknowledging once done.
    Reset(oneshot::Sender<()>),
}

/// An active collection subscription. Dropping it revokes all three
/// channels at once.
struct Subscription {
    generation: u64,
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.forwarder.abort();
    }
}

/// Keeps the registry in sync with the remote collections.
pub struct FeedListener {
    store: Arc<dyn RemoteStore>,
    registry: Arc<SiteRegistry>,
    apply_tx: mpsc::Sender<Apply>,
    slots: Mutex<BTreeMap<SiteKind, Subscription>>,
    /// Generation currently allowed to write, per kind.
    live: Arc<DashMap<SiteKind, u64>>,
    next_generation: AtomicU64,
    cancel: CancellationToken,
    applier: Mutex<Option<JoinHandle<()>>>,
}

impl FeedListener {
    /// Create a listener and start its applier task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        registry: Arc<SiteRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let (apply_tx, apply_rx) = mpsc::channel(APPLY_CHANNEL_SIZE);
        let live = Arc::new(DashMap::new());

        let applier = tokio::spawn(applier_task(
            Arc::clone(&registry),
            Arc::clone(&live),
            apply_rx,
            cancel.clone(),
        ));

        Self {
            store,
            registry,
            apply_tx,
            slots: Mutex::new(BTreeMap::new()),
            live,
            next_generation: AtomicU64::new(1),
            cancel,
            applier: Mutex::new(Some(applier)),
        }
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.registry
    }

    /// Subscribe to the collection for `kind`.
    ///
    /// Subscribing an already-subscribed collection revokes the previous
    /// subscription before the new one is issued.
    pub fn subscribe(&self, kind: SiteKind) -> Result<(), CoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        self.live.remove(&kind);
        if let Some(previous) = slots.remove(&kind) {
            debug!(?kind, generation = previous.generation, "revoking previous subscription");
            drop(previous);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.cancel.child_token();
        let rx = self.store.listen(kind, cancel.clone())?;
        self.live.insert(kind, generation);

        let forwarder = tokio::spawn(forward_task(
            kind,
            generation,
            rx,
            self.apply_tx.clone(),
            cancel.clone(),
        ));

        info!(?kind, generation, "subscribed to collection");
        slots.insert(
            kind,
            Subscription {
                generation,
                cancel,
                forwarder,
            },
        );
        Ok(())
    }

    /// Revoke the subscription for `kind`, if any.
    pub fn unsubscribe(&self, kind: SiteKind) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        self.live.remove(&kind);
        if slots.remove(&kind).is_some() {
            info!(?kind, "unsubscribed from collection");
        }
    }

    /// Revoke every subscription.
    pub fn unsubscribe_all(&self) {
        for kind in SiteKind::ALL {
            self.unsubscribe(kind);
        }
    }

    pub fn is_subscribed(&self, kind: SiteKind) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    /// Revoke every subscription and clear the registry.
    ///
    /// The clear runs on the applier task, after every event already
    /// queued, so no event from a revoked subscription survives it.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.unsubscribe_all();
        let (tx, rx) = oneshot::channel();
        self.apply_tx
            .send(Apply::Reset(tx))
            .await
            .map_err(|_| CoreError::Disconnected)?;
        rx.await.map_err(|_| CoreError::Disconnected)
    }

    /// Stop every subscription and the applier task.
    pub async fn shutdown(&self) {
        self.unsubscribe_all();
        self.cancel.cancel();
        let handle = self
            .applier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for FeedListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Move one subscription's events onto the shared apply channel.
async fn forward_task(
    kind: SiteKind,
    generation: u64,
    mut rx: mpsc::Receiver<FeedEvent>,
    apply_tx: mpsc::Sender<Apply>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                let msg = Apply::Event { kind, generation, event };
                if apply_tx.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }
    trace!(?kind, generation, "forwarder exiting");
}

/// The registry's only writer.
async fn applier_task(
    registry: Arc<SiteRegistry>,
    live: Arc<DashMap<SiteKind, u64>>,
    mut rx: mpsc::Receiver<Apply>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    Apply::Event { kind, generation, event } => {
                        let is_live = live.get(&kind).is_some_and(|g| *g == generation);
                        if is_live {
                            apply_event(&registry, kind, event);
                        } else {
                            trace!(?kind, generation, "discarding event from revoked subscription");
                        }
                    }
                    Apply::Reset(ack) => {
                        registry.clear();
                        let _ = ack.send(());
                    }
                }
            }
        }
    }
}

/// Apply one feed event. Undecodable children are dropped, never fatal.
pub(crate) fn apply_event(registry: &SiteRegistry, kind: SiteKind, event: FeedEvent) {
    match event {
        FeedEvent::Synced => {
            debug!(?kind, sites = registry.len(), "initial replay complete");
            registry.mark_synced(kind);
        }
        FeedEvent::Child(ChildEvent::Added { key, value }) => match decode_child(&value, kind) {
            Ok(record) => {
                registry.upsert(record);
            }
            Err(e) => debug!(?kind, %key, error = %e, "dropping undecodable site"),
        },
        FeedEvent::Child(ChildEvent::Changed { key, value }) => match decode_child(&value, kind) {
            Ok(record) => {
                registry.upsert(record);
            }
            // A child whose site data was deleted (comments may remain) no
            // longer describes a site.
            Err(e) => match stale_record(registry, kind, &key) {
                Some(stale) => {
                    debug!(?kind, %key, error = %e, "site data gone, removing site");
                    registry.remove(&stale);
                }
                None => debug!(?kind, %key, error = %e, "dropping undecodable site"),
            },
        },
        FeedEvent::Child(ChildEvent::Removed { key, value }) => match decode_child(&value, kind) {
            Ok(record) => {
                registry.remove(&record.coordinate_key);
            }
            Err(e) => debug!(?kind, %key, error = %e, "cannot decode removed site, ignoring"),
        },
    }
}

/// Key of the registry record filed under `kind` for child `key`, if any.
fn stale_record(registry: &SiteRegistry, kind: SiteKind, key: &str) -> Option<CoordinateKey> {
    let key = key.parse::<CoordinateKey>().ok()?;
    registry
        .get(&key)
        .filter(|record| record.collection == kind)
        .map(|record| record.coordinate_key.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use vaccimap_api::StreamEvent;

    use super::*;
    use crate::backend::MemoryStore;
    use crate::feed::ChildTracker;
    use crate::model::PinColor;

    fn child(available: bool) -> Value {
        json!({
            "site data": {
                "coordinates": "40.7128 -74.006",
                "is vaccination site": false,
                "wait time": "15",
                "availability": available,
            }
        })
    }

    fn added(value: Value) -> FeedEvent {
        FeedEvent::Child(ChildEvent::Added {
            key: "40_713 -74_006".into(),
            value,
        })
    }

    #[test]
    fn add_change_remove_scenario() {
        let registry = SiteRegistry::new();
        let key = CoordinateKey::encode(40.7128, -74.0060).unwrap();

        apply_event(&registry, SiteKind::TestingSite, added(child(true)));
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].coordinate_key.display(), "40.713 -74.006");
        assert_eq!(snap[0].wait_time_minutes, Some(15));
        assert_eq!(snap[0].color(), PinColor::Teal);

        apply_event(
            &registry,
            SiteKind::TestingSite,
            FeedEvent::Child(ChildEvent::Changed {
                key: key.as_str().into(),
                value: child(false),
            }),
        );
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].color(), PinColor::LightGray);

        apply_event(
            &registry,
            SiteKind::TestingSite,
            FeedEvent::Child(ChildEvent::Removed {
                key: key.as_str().into(),
                value: child(false),
            }),
        );
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn malformed_payload_never_mutates() {
        let registry = SiteRegistry::new();
        apply_event(&registry, SiteKind::TestingSite, added(child(true)));
        let version = registry.version();

        for junk in [
            json!("garbage"),
            json!({ "site data": { "coordinates": 12 } }),
            json!({ "site data": { "coordinates": "1.0 2.0", "availability": "perhaps" } }),
            json!({ "comments": {} }),
        ] {
            apply_event(&registry, SiteKind::TestingSite, added(junk.clone()));
            apply_event(
                &registry,
                SiteKind::TestingSite,
                FeedEvent::Child(ChildEvent::Removed {
                    key: "x".into(),
                    value: junk,
                }),
            );
        }

        assert_eq!(registry.version(), version);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn changed_child_without_site_data_removes_site() {
        let registry = SiteRegistry::new();
        apply_event(&registry, SiteKind::TestingSite, added(child(true)));

        let comments_only = || {
            FeedEvent::Child(ChildEvent::Changed {
                key: "40_713 -74_006".into(),
                value: json!({ "comments": { "-M1": "still here" } }),
            })
        };

        // The record is filed under Testing Sites; the other collection
        // cannot remove it.
        apply_event(&registry, SiteKind::VaccinationSite, comments_only());
        assert_eq!(registry.len(), 1);

        apply_event(&registry, SiteKind::TestingSite, comments_only());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn deleting_site_data_through_the_tracker_removes_site() {
        let registry = SiteRegistry::new();
        let mut tracker = ChildTracker::new();
        let mut replay = child(true);
        replay["comments"] = json!({ "-M1": "open late" });

        let events = tracker.apply(StreamEvent::Put {
            path: "/".into(),
            data: json!({ "40_713 -74_006": replay }),
        });
        for event in events {
            apply_event(&registry, SiteKind::TestingSite, event);
        }
        assert_eq!(registry.len(), 1);

        let events = tracker.apply(StreamEvent::Put {
            path: "/40_713 -74_006/site data".into(),
            data: Value::Null,
        });
        for event in events {
            apply_event(&registry, SiteKind::TestingSite, event);
        }
        assert_eq!(registry.len(), 0);
    }

    async fn settle(registry: &SiteRegistry, len: usize) {
        let mut stream = registry.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while stream.current().len() != len {
                stream.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    fn site_at(key: &str, coordinates: &str) -> FeedEvent {
        FeedEvent::Child(ChildEvent::Added {
            key: key.into(),
            value: json!({ "site data": { "coordinates": coordinates } }),
        })
    }

    #[tokio::test]
    async fn resubscribing_revokes_the_previous_subscription() {
        let store = MemoryStore::new();
        let registry = Arc::new(SiteRegistry::new());
        let listener = FeedListener::new(
            Arc::new(store.clone()),
            Arc::clone(&registry),
            CancellationToken::new(),
        );

        listener.subscribe(SiteKind::TestingSite).unwrap();
        let first = *listener.live.get(&SiteKind::TestingSite).unwrap();
        listener.subscribe(SiteKind::TestingSite).unwrap();
        let second = *listener.live.get(&SiteKind::TestingSite).unwrap();
        assert_ne!(first, second);
        assert!(listener.is_subscribed(SiteKind::TestingSite));
        assert!(!listener.is_subscribed(SiteKind::VaccinationSite));
        assert_eq!(listener.slots.lock().unwrap().len(), 1);

        store.put_raw(SiteKind::TestingSite, "40_713 -74_006", child(true));
        settle(&registry, 1).await;

        // Queued behind each other: the revoked generation's event must be
        // dropped, the live one applied.
        for (generation, event) in [
            (first, site_at("1_0 2_0", "1.0 2.0")),
            (second, site_at("3_0 4_0", "3.0 4.0")),
        ] {
            listener
                .apply_tx
                .send(Apply::Event {
                    kind: SiteKind::TestingSite,
                    generation,
                    event,
                })
                .await
                .unwrap();
        }
        settle(&registry, 2).await;

        let keys: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|site| site.coordinate_key.as_str().to_owned())
            .collect();
        assert_eq!(keys, vec!["3_0 4_0", "40_713 -74_006"]);

        listener.shutdown().await;
        assert!(!listener.is_subscribed(SiteKind::TestingSite));
    }

    #[test]
    fn synced_marks_kind() {
        let registry = SiteRegistry::new();
        apply_event(&registry, SiteKind::VaccinationSite, FeedEvent::Synced);
        assert!(registry.synced(SiteKind::VaccinationSite));
        assert!(!registry.synced(SiteKind::TestingSite));
    }
}
