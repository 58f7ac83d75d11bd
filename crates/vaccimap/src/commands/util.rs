//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use serde_json::json;
use url::Url;

use vaccimap_core::{ControllerConfig, CoordinateKey, MemoryStore, SiteFilter, SiteKind};

use crate::cli::{CoordArgs, FilterArgs, KindArg};
use crate::error::CliError;

use super::Session;

pub fn site_kind(arg: KindArg) -> SiteKind {
    match arg {
        KindArg::Testing => SiteKind::TestingSite,
        KindArg::Vaccination => SiteKind::VaccinationSite,
    }
}

/// Storage key for a coordinate pair given on the command line.
pub fn coordinate_key(at: &CoordArgs) -> Result<CoordinateKey, CliError> {
    Ok(CoordinateKey::encode(at.latitude, at.longitude)?)
}

/// Combine the filter flags into one predicate.
pub fn site_filter(args: &FilterArgs) -> SiteFilter {
    let mut filters = Vec::new();
    if let Some(kind) = args.kind {
        filters.push(SiteFilter::ByKind(site_kind(kind)));
    }
    if args.available {
        filters.push(SiteFilter::Available);
    }
    if args.unavailable {
        filters.push(SiteFilter::Unavailable);
    }
    if let Some(max) = args.max_wait {
        filters.push(SiteFilter::MaxWait(max));
    }
    SiteFilter::AllOf(filters)
}

pub fn wait_label(wait: Option<u32>) -> String {
    wait.map_or_else(|| "-".into(), |w| format!("{w} min"))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool, action: &str) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

// ── Offline demo data ────────────────────────────────────────────────

const OFFLINE_URL: &str = "memory://offline";

/// A session over an in-process store seeded with a few sites.
pub fn offline_session() -> Result<Session, CliError> {
    let database_url = Url::parse(OFFLINE_URL).map_err(|e| CliError::Internal {
        message: format!("offline URL: {e}"),
    })?;
    let store = MemoryStore::new();
    seed_demo(&store);
    Ok(Session {
        config: ControllerConfig::new(database_url),
        store: Arc::new(store),
    })
}

fn seed_demo(store: &MemoryStore) {
    let sites = [
        (SiteKind::TestingSite, "40_713 -74_006", "40.713 -74.006", "15", true),
        (SiteKind::TestingSite, "40_758 -73_986", "40.758 -73.986", "", false),
        (SiteKind::VaccinationSite, "40_748 -73_986", "40.748 -73.986", "30", true),
        (SiteKind::VaccinationSite, "40_706 -73_997", "40.706 -73.997", "45", false),
    ];
    for (kind, key, coordinates, wait, available) in sites {
        store.put_raw(
            kind,
            &format!("{key}/site data"),
            json!({
                "coordinates": coordinates,
                "is vaccination site": kind.is_vaccination_site(),
                "wait time": wait,
                "availability": available,
            }),
        );
    }
    store.put_raw(
        SiteKind::TestingSite,
        "40_713 -74_006/comments/-M000000000000000001",
        json!("Rapid tests only, results in 20 minutes"),
    );
    store.put_raw(
        SiteKind::TestingSite,
        "40_713 -74_006/comments/-M000000000000000002",
        json!("Bring your insurance card"),
    );
}

#[cfg(test)]
mod tests {
    use vaccimap_core::SiteRecord;

    use super::*;

    #[test]
    fn filter_flags_combine() {
        let args = FilterArgs {
            kind: Some(KindArg::Vaccination),
            available: true,
            unavailable: false,
            max_wait: Some(30),
        };
        let filter = site_filter(&args);

        let hit = SiteRecord::new(SiteKind::VaccinationSite, 1.0, 2.0, Some(30), true);
        let slow = SiteRecord::new(SiteKind::VaccinationSite, 1.0, 2.0, Some(31), true);
        let testing = SiteRecord::new(SiteKind::TestingSite, 1.0, 2.0, Some(5), true);
        assert!(hit.is_ok_and(|s| filter.matches(&s)));
        assert!(slow.is_ok_and(|s| !filter.matches(&s)));
        assert!(testing.is_ok_and(|s| !filter.matches(&s)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn offline_session_uses_memory_url() {
        let session = offline_session().unwrap();
        assert_eq!(session.config.database_url.scheme(), "memory");
    }
}
