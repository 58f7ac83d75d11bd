// ── Filter predicates for site snapshots ──
//
// Used by consumers to narrow a snapshot without touching the registry.

use crate::model::{PinColor, SiteKind, SiteRecord};

/// Filter predicate for site records.
pub enum SiteFilter {
    All,
    ByKind(SiteKind),
    ByColor(PinColor),
    Available,
    Unavailable,
    /// Known wait time of at most this many minutes.
    MaxWait(u32),
    /// Every inner filter matches. Empty matches everything.
    AllOf(Vec<SiteFilter>),
    Custom(Box<dyn Fn(&SiteRecord) -> bool + Send + Sync>),
}

impl SiteFilter {
    pub fn matches(&self, site: &SiteRecord) -> bool {
        match self {
            Self::All => true,
            Self::ByKind(kind) => site.kind == *kind,
            Self::ByColor(color) => site.color() == *color,
            Self::Available => site.available,
            Self::Unavailable => !site.available,
            Self::MaxWait(max) => site.wait_time_minutes.is_some_and(|w| w <= *max),
            Self::AllOf(filters) => filters.iter().all(|f| f.matches(site)),
            Self::Custom(f) => f(site),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn filters_match() {
        let site = SiteRecord::new(SiteKind::VaccinationSite, 1.0, 2.0, Some(20), false).unwrap();

        assert!(SiteFilter::All.matches(&site));
        assert!(SiteFilter::ByKind(SiteKind::VaccinationSite).matches(&site));
        assert!(!SiteFilter::ByKind(SiteKind::TestingSite).matches(&site));
        assert!(SiteFilter::ByColor(PinColor::Gray).matches(&site));
        assert!(SiteFilter::Unavailable.matches(&site));
        assert!(!SiteFilter::Available.matches(&site));
        assert!(SiteFilter::MaxWait(30).matches(&site));
        assert!(!SiteFilter::MaxWait(10).matches(&site));
        assert!(SiteFilter::Custom(Box::new(|s| s.latitude > 0.5)).matches(&site));
        assert!(SiteFilter::AllOf(vec![]).matches(&site));
        assert!(
            SiteFilter::AllOf(vec![SiteFilter::Unavailable, SiteFilter::MaxWait(20)]).matches(&site)
        );
        assert!(
            !SiteFilter::AllOf(vec![SiteFilter::Unavailable, SiteFilter::MaxWait(19)])
                .matches(&site)
        );
    }

    #[test]
    fn unknown_wait_never_matches_max_wait() {
        let site = SiteRecord::new(SiteKind::TestingSite, 1.0, 2.0, None, true).unwrap();
        assert!(!SiteFilter::MaxWait(u32::MAX).matches(&site));
    }
}
