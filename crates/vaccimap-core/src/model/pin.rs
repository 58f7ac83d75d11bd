// ── Pin color resolution ──
//
// Colors are derived from a record on demand; nothing is cached.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use strum::Display;

use super::site::{SiteKind, SiteRecord};

/// Map pin color for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PinColor {
    /// Vaccination site with doses available.
    Green,
    /// Vaccination site out of doses.
    Gray,
    /// Testing site with tests available.
    Teal,
    /// Testing site out of tests.
    LightGray,
    /// Sentinel for an unrecognized kind label.
    Error,
}

impl PinColor {
    pub fn resolve(kind: SiteKind, available: bool) -> Self {
        match (kind, available) {
            (SiteKind::VaccinationSite, true) => Self::Green,
            (SiteKind::VaccinationSite, false) => Self::Gray,
            (SiteKind::TestingSite, true) => Self::Teal,
            (SiteKind::TestingSite, false) => Self::LightGray,
        }
    }

    /// Resolve from a kind label such as `"Testing Site"`.
    /// Unknown labels yield [`PinColor::Error`].
    pub fn resolve_label(label: &str, available: bool) -> Self {
        SiteKind::from_str(label).map_or(Self::Error, |kind| Self::resolve(kind, available))
    }

    /// `#RRGGBB` token for renderers.
    pub fn hex(self) -> &'static str {
        match self {
            Self::Green => "#34C759",
            Self::Gray => "#8E8E93",
            Self::Teal => "#30B0C7",
            Self::LightGray => "#AAAAAA",
            Self::Error => "#FF3B30",
        }
    }

    /// The same color as an `(r, g, b)` triple.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Green => (0x34, 0xC7, 0x59),
            Self::Gray => (0x8E, 0x8E, 0x93),
            Self::Teal => (0x30, 0xB0, 0xC7),
            Self::LightGray => (0xAA, 0xAA, 0xAA),
            Self::Error => (0xFF, 0x3B, 0x30),
        }
    }
}

/// A registry record paired with its resolved color.
#[derive(Debug, Clone, Serialize)]
pub struct Pin {
    pub record: Arc<SiteRecord>,
    pub color: PinColor,
}

impl From<Arc<SiteRecord>> for Pin {
    fn from(record: Arc<SiteRecord>) -> Self {
        let color = record.color();
        Self { record, color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_table() {
        assert_eq!(PinColor::resolve(SiteKind::VaccinationSite, true), PinColor::Green);
        assert_eq!(PinColor::resolve(SiteKind::VaccinationSite, false), PinColor::Gray);
        assert_eq!(PinColor::resolve(SiteKind::TestingSite, true), PinColor::Teal);
        assert_eq!(PinColor::resolve(SiteKind::TestingSite, false), PinColor::LightGray);
    }

    #[test]
    fn labels_resolve() {
        assert_eq!(PinColor::resolve_label("Testing Site", true), PinColor::Teal);
        assert_eq!(PinColor::resolve_label("Vaccination Site", false), PinColor::Gray);
        assert_eq!(PinColor::resolve_label("Pharmacy", true), PinColor::Error);
        assert_eq!(PinColor::resolve_label("", false), PinColor::Error);
    }

    #[test]
    fn hex_matches_rgb() {
        for color in [
            PinColor::Green,
            PinColor::Gray,
            PinColor::Teal,
            PinColor::LightGray,
            PinColor::Error,
        ] {
            let (r, g, b) = color.rgb();
            assert_eq!(color.hex(), format!("#{r:02X}{g:02X}{b:02X}"));
        }
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(PinColor::LightGray.to_string(), "light_gray");
    }
}
