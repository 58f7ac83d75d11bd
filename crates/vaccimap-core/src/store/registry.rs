// ── Local site registry ──
//
// The authoritative client-side view of every known site, merged from
// both remote collections and keyed by coordinate key. A cross-collection
// key conflict resolves to whichever record was applied last.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::collection::EntityCollection;
use crate::error::CoreError;
use crate::model::{CoordinateKey, Pin, SiteKind, SiteRecord};
use crate::stream::SiteStream;

/// Concurrent, reactive registry of site records.
pub struct SiteRegistry {
    sites: EntityCollection<CoordinateKey, SiteRecord>,
    /// Kinds whose collection finished its initial replay this session.
    synced: watch::Sender<BTreeSet<SiteKind>>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteRegistry {
    pub fn new() -> Self {
        let (synced, _) = watch::channel(BTreeSet::new());
        Self {
            sites: EntityCollection::new(),
            synced,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Insert or wholesale-replace a record. Returns `true` if its key was new.
    pub fn upsert(&self, record: SiteRecord) -> bool {
        let key = record.coordinate_key.clone();
        let is_new = self.sites.upsert(key.clone(), record);
        debug!(%key, is_new, "registry upsert");
        is_new
    }

    /// Remove a record. Removing an unknown key is a no-op.
    pub fn remove(&self, key: &CoordinateKey) -> Option<Arc<SiteRecord>> {
        let removed = self.sites.remove(key);
        debug!(%key, found = removed.is_some(), "registry remove");
        removed
    }

    /// Drop every record and forget which collections were synced.
    pub fn clear(&self) {
        self.sites.clear();
        self.synced.send_modify(BTreeSet::clear);
    }

    pub(crate) fn mark_synced(&self, kind: SiteKind) {
        self.synced.send_if_modified(|set| set.insert(kind));
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, key: &CoordinateKey) -> Option<Arc<SiteRecord>> {
        self.sites.get(key)
    }

    /// All records ordered by coordinate key.
    pub fn snapshot(&self) -> Arc<Vec<Arc<SiteRecord>>> {
        self.sites.snapshot()
    }

    /// Every record paired with its pin color, in snapshot order.
    pub fn pins(&self) -> Vec<Pin> {
        self.snapshot().iter().cloned().map(Pin::from).collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Mutations applied since the registry was created.
    pub fn version(&self) -> u64 {
        self.sites.version()
    }

    /// Whether the collection for `kind` delivered its initial replay.
    pub fn synced(&self, kind: SiteKind) -> bool {
        self.synced.borrow().contains(&kind)
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> SiteStream {
        SiteStream::new(self.sites.subscribe())
    }

    /// Wait until every kind in `kinds` has synced.
    pub async fn wait_synced(&self, kinds: &[SiteKind], timeout: Duration) -> Result<(), CoreError> {
        let mut rx = self.synced.subscribe();
        let all_synced = |set: &BTreeSet<SiteKind>| kinds.iter().all(|k| set.contains(k));

        tokio::time::timeout(timeout, rx.wait_for(all_synced))
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
            .map(|_| ())
            .map_err(|_| CoreError::Disconnected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::PinColor;

    fn testing_site(available: bool) -> SiteRecord {
        SiteRecord::new(SiteKind::TestingSite, 40.7128, -74.0060, Some(15), available).unwrap()
    }

    #[test]
    fn upsert_is_idempotent() {
        let registry = SiteRegistry::new();
        assert!(registry.upsert(testing_site(true)));
        let first = registry.snapshot();

        assert!(!registry.upsert(testing_site(true)));
        let second = registry.snapshot();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(*first[0], *second[0]);
    }

    #[test]
    fn remove_unknown_key_is_noop() {
        let registry = SiteRegistry::new();
        registry.upsert(testing_site(true));

        let other = CoordinateKey::encode(1.0, 2.0).unwrap();
        assert!(registry.remove(&other).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cross_collection_conflict_is_last_write_wins() {
        let registry = SiteRegistry::new();
        registry.upsert(testing_site(true));
        let vaccination =
            SiteRecord::new(SiteKind::VaccinationSite, 40.71281, -74.00604, None, true).unwrap();
        registry.upsert(vaccination);

        assert_eq!(registry.len(), 1);
        let key = CoordinateKey::encode(40.713, -74.006).unwrap();
        assert_eq!(registry.get(&key).unwrap().kind, SiteKind::VaccinationSite);
    }

    #[test]
    fn pins_follow_records() {
        let registry = SiteRegistry::new();
        registry.upsert(testing_site(true));
        registry.upsert(
            SiteRecord::new(SiteKind::VaccinationSite, 1.0, 2.0, None, false).unwrap(),
        );

        let colors: Vec<PinColor> = registry.pins().iter().map(|p| p.color).collect();
        // "1_0 2_0" sorts before "40_713 -74_006".
        assert_eq!(colors, vec![PinColor::Gray, PinColor::Teal]);
    }

    #[test]
    fn clear_resets_sync_state() {
        let registry = SiteRegistry::new();
        registry.upsert(testing_site(true));
        registry.mark_synced(SiteKind::TestingSite);
        assert!(registry.synced(SiteKind::TestingSite));
        assert!(!registry.synced(SiteKind::VaccinationSite));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.synced(SiteKind::TestingSite));
    }

    #[tokio::test]
    async fn wait_synced_times_out() {
        let registry = SiteRegistry::new();
        registry.mark_synced(SiteKind::TestingSite);

        let err = registry
            .wait_synced(&SiteKind::ALL, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));

        registry.mark_synced(SiteKind::VaccinationSite);
        registry
            .wait_synced(&SiteKind::ALL, Duration::from_millis(20))
            .await
            .unwrap();
    }
}
