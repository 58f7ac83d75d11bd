// ── Site domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::coordinate::CoordinateKey;
use super::pin::PinColor;
use crate::error::CoreError;

/// What a site offers. Each kind lives in its own remote collection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    #[strum(serialize = "Testing Site")]
    TestingSite,
    #[strum(serialize = "Vaccination Site")]
    VaccinationSite,
}

impl SiteKind {
    /// Both kinds, in display order.
    pub const ALL: [SiteKind; 2] = [SiteKind::TestingSite, SiteKind::VaccinationSite];

    /// Human-readable label, e.g. `"Testing Site"`.
    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Kind for the stored `is vaccination site` flag.
    pub fn from_vaccination_flag(is_vaccination_site: bool) -> Self {
        if is_vaccination_site {
            Self::VaccinationSite
        } else {
            Self::TestingSite
        }
    }

    pub fn is_vaccination_site(self) -> bool {
        matches!(self, Self::VaccinationSite)
    }

    /// Default name of the remote collection holding this kind.
    pub fn default_collection(self) -> &'static str {
        match self {
            Self::TestingSite => "Testing Sites",
            Self::VaccinationSite => "Vaccination Sites",
        }
    }
}

/// A normalized, validated site report as held in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRecord {
    pub coordinate_key: CoordinateKey,
    pub kind: SiteKind,
    /// Collection the record lives in. Usually equal to `kind`, but a
    /// child may carry a flag that disagrees with where it is filed.
    pub collection: SiteKind,
    /// `None` means the wait time is unknown.
    pub wait_time_minutes: Option<u32>,
    pub available: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl SiteRecord {
    /// Build a record, rounding the coordinates into their key cell.
    pub fn new(
        kind: SiteKind,
        latitude: f64,
        longitude: f64,
        wait_time_minutes: Option<u32>,
        available: bool,
    ) -> Result<Self, CoreError> {
        let coordinate_key = CoordinateKey::encode(latitude, longitude)?;
        let (latitude, longitude) = coordinate_key.coordinates();
        Ok(Self {
            coordinate_key,
            kind,
            collection: kind,
            wait_time_minutes,
            available,
            latitude,
            longitude,
        })
    }

    /// The same record, filed under `collection`.
    pub fn in_collection(mut self, collection: SiteKind) -> Self {
        self.collection = collection;
        self
    }

    /// Pin color for this record.
    pub fn color(&self) -> PinColor {
        PinColor::resolve(self.kind, self.available)
    }
}

/// A user's report of a site, before it is written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteReport {
    pub latitude: f64,
    pub longitude: f64,
    pub kind: SiteKind,
    pub wait_time_minutes: Option<u32>,
    pub available: bool,
    /// Optional comment appended after the site data is stored.
    pub comment: Option<String>,
}

impl SiteReport {
    /// The record this report writes. Fails on non-finite coordinates.
    pub fn to_record(&self) -> Result<SiteRecord, CoreError> {
        SiteRecord::new(
            self.kind,
            self.latitude,
            self.longitude,
            self.wait_time_minutes,
            self.available,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn labels_round_trip_through_strum() {
        for kind in SiteKind::iter() {
            assert_eq!(kind.to_string(), kind.label());
            assert_eq!(SiteKind::from_str(kind.label()).unwrap(), kind);
        }
        assert!(SiteKind::from_str("Pharmacy").is_err());
    }

    #[test]
    fn records_are_filed_under_their_kind_by_default() {
        let record = SiteRecord::new(SiteKind::VaccinationSite, 1.0, 2.0, None, true).unwrap();
        assert_eq!(record.collection, SiteKind::VaccinationSite);

        let filed = record.in_collection(SiteKind::TestingSite);
        assert_eq!(filed.kind, SiteKind::VaccinationSite);
        assert_eq!(filed.collection, SiteKind::TestingSite);
    }

    #[test]
    fn vaccination_flag() {
        assert_eq!(SiteKind::from_vaccination_flag(true), SiteKind::VaccinationSite);
        assert_eq!(SiteKind::from_vaccination_flag(false), SiteKind::TestingSite);
        assert!(SiteKind::VaccinationSite.is_vaccination_site());
    }

    #[test]
    fn record_coordinates_are_rounded() {
        let record = SiteRecord::new(SiteKind::TestingSite, 40.7128, -74.0060, Some(15), true)
            .unwrap();
        assert_eq!(record.coordinate_key.as_str(), "40_713 -74_006");
        assert_eq!(record.latitude, 40.713);
        assert_eq!(record.longitude, -74.006);
        assert_eq!(record.color(), PinColor::Teal);
    }

    #[test]
    fn report_with_bad_coordinates_fails() {
        let report = SiteReport {
            latitude: f64::NAN,
            longitude: 0.0,
            kind: SiteKind::VaccinationSite,
            wait_time_minutes: None,
            available: true,
            comment: None,
        };
        assert!(matches!(
            report.to_record(),
            Err(CoreError::InvalidCoordinate { .. })
        ));
    }
}
