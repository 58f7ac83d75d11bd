// ── Wire ↔ domain conversion ──
//
// Decodes the loosely-typed JSON stored under each site node into
// validated `SiteRecord`s, and encodes records back for writes.
// Remote data is written by many app versions; decoding is lenient where
// a sensible default exists and strict where guessing would corrupt data.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::coordinate;
use crate::model::{Comment, CommentId, SiteKind, SiteRecord};

/// Field names of a site node.
pub mod keys {
    pub const SITE_DATA: &str = "site data";
    pub const COMMENTS: &str = "comments";
    pub const COORDINATES: &str = "coordinates";
    pub const IS_VACCINATION_SITE: &str = "is vaccination site";
    pub const WAIT_TIME: &str = "wait time";
    pub const AVAILABILITY: &str = "availability";
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode a whole child node (`{"site data": {...}, "comments": {...}}`).
///
/// `collection_kind` is the kind of the collection the child was read
/// from; it applies when the record omits its own flag.
pub fn decode_child(child: &Value, collection_kind: SiteKind) -> Result<SiteRecord, CoreError> {
    let site_data = child
        .get(keys::SITE_DATA)
        .ok_or_else(|| CoreError::malformed("child has no site data"))?;
    decode_site_data(site_data, collection_kind)
}

/// Decode and normalize a `"site data"` object.
pub fn decode_site_data(
    value: &Value,
    collection_kind: SiteKind,
) -> Result<SiteRecord, CoreError> {
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::malformed("site data is not an object"))?;

    let coordinates = obj
        .get(keys::COORDINATES)
        .ok_or_else(|| CoreError::malformed("missing coordinates"))?
        .as_str()
        .ok_or_else(|| CoreError::malformed("coordinates is not a string"))?;
    let (lat, lon) = coordinate::decode(coordinates)?;

    let kind = match present(obj, keys::IS_VACCINATION_SITE) {
        Some(flag) => SiteKind::from_vaccination_flag(
            coerce_bool(flag).ok_or_else(|| {
                CoreError::malformed(format!("{} is not a boolean: {flag}", keys::IS_VACCINATION_SITE))
            })?,
        ),
        None => collection_kind,
    };

    let available = match present(obj, keys::AVAILABILITY) {
        Some(flag) => coerce_bool(flag).ok_or_else(|| {
            CoreError::malformed(format!("{} is not a boolean: {flag}", keys::AVAILABILITY))
        })?,
        None => true,
    };

    let wait_time_minutes = obj.get(keys::WAIT_TIME).and_then(coerce_wait_time);

    SiteRecord::new(kind, lat, lon, wait_time_minutes, available)
        .map(|record| record.in_collection(collection_kind))
        .map_err(|e| CoreError::malformed(e.to_string()))
}

/// Field value, treating explicit `null` as absent.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Accepts JSON booleans, `"true"`/`"false"` in any case, and `0`/`1`.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Blank, negative, or non-numeric wait times are unknown rather than zero.
fn coerce_wait_time(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        _ => None,
    }
}

/// Decode the `comments` map of a site. Non-string entries are skipped;
/// the result is ordered by id, which is creation order.
pub fn decode_comments(value: Option<Value>) -> Vec<Comment> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };

    let sorted: BTreeMap<String, Value> = map.into_iter().collect();
    sorted
        .into_iter()
        .filter_map(|(id, v)| match v {
            Value::String(text) => Some(Comment {
                id: CommentId::new(id),
                text,
            }),
            _ => None,
        })
        .collect()
}

// ── Encoding ────────────────────────────────────────────────────────

/// Encode a record as a `"site data"` object.
pub fn encode_site_data(record: &SiteRecord) -> Value {
    let mut obj = Map::new();
    obj.insert(
        keys::COORDINATES.into(),
        Value::String(record.coordinate_key.display()),
    );
    obj.insert(
        keys::IS_VACCINATION_SITE.into(),
        Value::Bool(record.kind.is_vaccination_site()),
    );
    obj.insert(
        keys::WAIT_TIME.into(),
        Value::String(
            record
                .wait_time_minutes
                .map(|m| m.to_string())
                .unwrap_or_default(),
        ),
    );
    obj.insert(keys::AVAILABILITY.into(), Value::Bool(record.available));
    Value::Object(obj)
}
