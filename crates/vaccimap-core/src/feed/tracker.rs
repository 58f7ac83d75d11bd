// ── Child event derivation ──
//
// The streaming API addresses writes by path relative to the collection.
// The tracker mirrors every direct child of the collection so that a
// write anywhere below a child can be reported as that child being
// added, changed, or removed, with the removed value still at hand.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, trace};
use vaccimap_api::StreamEvent;

use super::{ChildEvent, FeedEvent};

/// Mirror of one collection's children.
#[derive(Debug, Default)]
pub struct ChildTracker {
    children: BTreeMap<String, Value>,
}

impl ChildTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known value of a child.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.children.get(key)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Fold one stream event into the mirror and return the resulting
    /// child events. A `put` at the root is a full replay: it is diffed
    /// against the mirror and followed by [`FeedEvent::Synced`].
    pub fn apply(&mut self, event: StreamEvent) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        match event {
            StreamEvent::Put { path, data } => {
                let segments = split_path(&path);
                if segments.is_empty() {
                    self.replace_all(data, &mut out);
                    out.push(FeedEvent::Synced);
                } else {
                    self.put_at(&segments, data, &mut out);
                }
            }
            StreamEvent::Patch { path, data } => {
                let Value::Object(members) = data else {
                    debug!(%path, "ignoring patch without an object body");
                    return out;
                };
                let base = split_path(&path);
                for (member, value) in members {
                    let mut target = base.clone();
                    target.extend(split_path(&member));
                    self.put_at(&target, value, &mut out);
                }
            }
        }
        out
    }

    /// Forget every child, e.g. when a subscription is torn down.
    pub fn reset(&mut self) {
        self.children.clear();
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn replace_all(&mut self, data: Value, out: &mut Vec<FeedEvent>) {
        let incoming: BTreeMap<String, Value> = match data {
            Value::Object(map) => map.into_iter().filter(|(_, v)| !is_empty(v)).collect(),
            Value::Null => BTreeMap::new(),
            other => {
                debug!(value = %other, "collection root is not an object, treating as empty");
                BTreeMap::new()
            }
        };

        let mut previous = std::mem::take(&mut self.children);

        let gone: Vec<String> = previous
            .keys()
            .filter(|k| !incoming.contains_key(*k))
            .cloned()
            .collect();
        for key in gone {
            if let Some(value) = previous.remove(&key) {
                out.push(FeedEvent::Child(ChildEvent::Removed { key, value }));
            }
        }

        for (key, value) in incoming {
            match previous.remove(&key) {
                None => out.push(FeedEvent::Child(ChildEvent::Added {
                    key: key.clone(),
                    value: value.clone(),
                })),
                Some(old) if old != value => out.push(FeedEvent::Child(ChildEvent::Changed {
                    key: key.clone(),
                    value: value.clone(),
                })),
                Some(_) => trace!(%key, "replayed child unchanged"),
            }
            self.children.insert(key, value);
        }
    }

    fn put_at(&mut self, segments: &[String], data: Value, out: &mut Vec<FeedEvent>) {
        let Some((child, rest)) = segments.split_first() else {
            return;
        };

        let after = if rest.is_empty() {
            data
        } else {
            let mut value = self.children.get(child).cloned().unwrap_or(Value::Null);
            set_path(&mut value, rest, data);
            value
        };

        self.settle(child, after, out);
    }

    /// Store a child's new value and report how it moved.
    fn settle(&mut self, key: &str, after: Value, out: &mut Vec<FeedEvent>) {
        if is_empty(&after) {
            if let Some(value) = self.children.remove(key) {
                out.push(FeedEvent::Child(ChildEvent::Removed {
                    key: key.to_owned(),
                    value,
                }));
            }
            return;
        }

        match self.children.insert(key.to_owned(), after.clone()) {
            None => out.push(FeedEvent::Child(ChildEvent::Added {
                key: key.to_owned(),
                value: after,
            })),
            Some(old) if old != after => out.push(FeedEvent::Child(ChildEvent::Changed {
                key: key.to_owned(),
                value: after,
            })),
            Some(_) => {}
        }
    }
}

pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `null` and `{}` both mean "no data" in the database.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Write `data` at `path` below `target`, pruning locations left empty.
pub(crate) fn set_path(target: &mut Value, path: &[String], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = data;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        if is_empty(&data) {
            map.remove(head);
        } else {
            map.insert(head.clone(), data);
        }
    } else {
        let entry = map.entry(head.clone()).or_insert(Value::Null);
        set_path(entry, rest, data);
        if is_empty(entry) {
            map.remove(head);
        }
    }

    if map.is_empty() {
        *target = Value::Null;
    }
}
