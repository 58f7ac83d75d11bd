// ── Coordinate key codec ──
//
// A site's identity is its location rounded to a 0.001-degree cell.
// Display form: "40.713 -74.006". Storage form replaces every '.' with
// '_' because the database forbids '.' in keys: "40_713 -74_006".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

const PRECISION: f64 = 1000.0;

/// Round to 3 decimal places, half away from zero.
pub fn round3(value: f64) -> f64 {
    (value * PRECISION).round() / PRECISION
}

/// Unique identity of a site, in storage form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CoordinateKey(String);

impl CoordinateKey {
    /// Derive the key for a location. Inputs are rounded first, so every
    /// pair inside the same cell produces the same key.
    pub fn encode(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        let (lat, lon) = (round_component(latitude)?, round_component(longitude)?);
        Ok(Self::from_rounded(lat, lon))
    }

    /// Build from an already-rounded pair.
    pub(crate) fn from_rounded(latitude: f64, longitude: f64) -> Self {
        Self(format!("{latitude:?} {longitude:?}").replace('.', "_"))
    }

    /// Storage form, as used for database keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form with decimal points restored.
    pub fn display(&self) -> String {
        self.0.replace('_', ".")
    }

    /// The rounded `(latitude, longitude)` this key was derived from.
    pub fn coordinates(&self) -> (f64, f64) {
        // Keys are only built by `encode`/`from_rounded`, so this parses.
        decode(&self.0).unwrap_or((f64::NAN, f64::NAN))
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl FromStr for CoordinateKey {
    type Err = CoreError;

    /// Accepts storage or display form and re-derives the canonical key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = decode(s)?;
        Self::encode(lat, lon)
    }
}

impl<'de> Deserialize<'de> for CoordinateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Recover the coordinate pair from a key in storage or display form.
///
/// The string must split on whitespace into exactly two finite numbers.
pub fn decode(key: &str) -> Result<(f64, f64), CoreError> {
    let normalized = key.replace('_', ".");
    let mut tokens = normalized.split_whitespace();

    let (Some(lat), Some(lon), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(CoreError::malformed(format!(
            "coordinates {key:?} must be two whitespace-separated numbers"
        )));
    };

    Ok((parse_component(lat, key)?, parse_component(lon, key)?))
}

fn parse_component(token: &str, key: &str) -> Result<f64, CoreError> {
    let value: f64 = token
        .parse()
        .map_err(|_| CoreError::malformed(format!("coordinate {token:?} in {key:?} is not a number")))?;
    if !value.is_finite() {
        return Err(CoreError::malformed(format!(
            "coordinate {token:?} in {key:?} is not finite"
        )));
    }
    Ok(value)
}

fn round_component(value: f64) -> Result<f64, CoreError> {
    if !value.is_finite() {
        return Err(CoreError::InvalidCoordinate {
            reason: format!("{value} is not a finite number"),
        });
    }
    let rounded = round3(value);
    if !rounded.is_finite() {
        return Err(CoreError::InvalidCoordinate {
            reason: format!("{value} is out of range"),
        });
    }
    Ok(rounded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encodes_storage_form() {
        let key = CoordinateKey::encode(40.7128, -74.0060).unwrap();
        assert_eq!(key.as_str(), "40_713 -74_006");
        assert_eq!(key.display(), "40.713 -74.006");
        assert_eq!(key.to_string(), "40.713 -74.006");
    }

    #[test]
    fn same_cell_same_key() {
        let a = CoordinateKey::encode(40.7128, -74.0060).unwrap();
        let b = CoordinateKey::encode(40.71281, -74.00604).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn whole_numbers_keep_a_fraction() {
        let key = CoordinateKey::encode(1.0, 2.0).unwrap();
        assert_eq!(key.as_str(), "1_0 2_0");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round3(0.0125), 0.013);
        assert_eq!(round3(-0.0125), -0.013);
    }

    #[test]
    fn negative_zero_keeps_its_sign() {
        let key = CoordinateKey::encode(-0.0001, 0.0001).unwrap();
        assert_eq!(key.as_str(), "-0_0 0_0");

        let (lat, lon) = key.coordinates();
        assert!(lat.is_sign_negative());
        assert!(lon.is_sign_positive());
    }

    #[test]
    fn round_trip_matches_direct_rounding() {
        let samples = [
            (40.7128, -74.0060),
            (-33.86785, 151.20732),
            (0.0005, -0.0005),
            (89.9999, -179.9994),
            (12.3456789, 98.7654321),
        ];
        for (lat, lon) in samples {
            let key = CoordinateKey::encode(lat, lon).unwrap();
            let (dlat, dlon) = decode(key.as_str()).unwrap();
            assert_eq!(round3(dlat), round3(lat), "lat for {key}");
            assert_eq!(round3(dlon), round3(lon), "lon for {key}");
        }
    }

    #[test]
    fn decode_accepts_both_forms() {
        assert_eq!(decode("40_713 -74_006").unwrap(), (40.713, -74.006));
        assert_eq!(decode("40.713   -74.006").unwrap(), (40.713, -74.006));
    }

    #[test]
    fn parse_canonicalizes() {
        let key: CoordinateKey = "40.7128 -74.0060".parse().unwrap();
        assert_eq!(key.as_str(), "40_713 -74_006");
    }

    #[test]
    fn malformed_keys_rejected() {
        for bad in ["", "40.713", "40.713 -74.006 1", "north south", "NaN 1.0", "inf 0"] {
            assert!(
                matches!(decode(bad), Err(CoreError::MalformedRecord { .. })),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn non_finite_input_rejected() {
        assert!(matches!(
            CoordinateKey::encode(f64::NAN, 0.0),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            CoordinateKey::encode(0.0, f64::INFINITY),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            CoordinateKey::encode(f64::MAX, 0.0),
            Err(CoreError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn deserializes_from_either_form() {
        let key: CoordinateKey = serde_json::from_str("\"40.713 -74.006\"").unwrap();
        assert_eq!(key.as_str(), "40_713 -74_006");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"40_713 -74_006\"");
    }
}
