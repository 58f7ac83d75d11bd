//! Site command handlers.

use serde::Serialize;
use tabled::Tabled;

use vaccimap_core::{Command as CoreCommand, CommandResult, PinColor, SiteKind, SiteRecord, SiteReport};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::error::CliError;
use crate::output;

use super::{Session, util};

// ── Views ────────────────────────────────────────────────────────────

/// Serialized form of a site for JSON/YAML output.
#[derive(Debug, Serialize)]
pub struct SiteView {
    pub key: String,
    pub coordinates: String,
    pub kind: SiteKind,
    pub available: bool,
    pub wait_time_minutes: Option<u32>,
    pub pin: PinColor,
    pub pin_hex: &'static str,
}

impl From<&SiteRecord> for SiteView {
    fn from(site: &SiteRecord) -> Self {
        let pin = site.color();
        Self {
            key: site.coordinate_key.as_str().to_owned(),
            coordinates: site.coordinate_key.display(),
            kind: site.kind,
            available: site.available,
            wait_time_minutes: site.wait_time_minutes,
            pin,
            pin_hex: pin.hex(),
        }
    }
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Coordinates")]
    coordinates: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Available")]
    available: &'static str,
    #[tabled(rename = "Wait")]
    wait: String,
    #[tabled(rename = "Pin")]
    pin: String,
}

fn site_row(site: &SiteView, colored: bool) -> SiteRow {
    SiteRow {
        coordinates: site.coordinates.clone(),
        kind: site.kind.label().to_owned(),
        available: if site.available { "yes" } else { "no" },
        wait: util::wait_label(site.wait_time_minutes),
        pin: output::pin_swatch(site.pin, colored),
    }
}

fn site_detail(site: &SiteView, colored: bool) -> String {
    let row = site_row(site, colored);
    output::detail_lines(&[
        ("Coordinates", row.coordinates),
        ("Key", site.key.clone()),
        ("Kind", row.kind),
        ("Available", row.available.into()),
        ("Wait", row.wait),
        ("Pin", format!("{} ({})", row.pin, site.pin_hex)),
    ])
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(session: Session, args: SitesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let colored = output::should_color(&global.color);

    match args.command {
        SitesCommand::List(filter_args) => {
            let filter = util::site_filter(&filter_args);
            let snapshot = session
                .oneshot(|c| async move { Ok(c.sites_snapshot()) })
                .await?;

            let views: Vec<SiteView> = snapshot
                .iter()
                .filter(|site| filter.matches(site))
                .map(|site| SiteView::from(site.as_ref()))
                .collect();

            let out = output::render_list(
                &global.output,
                &views,
                |s| site_row(s, colored),
                |s| s.coordinates.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Get(at) => {
            let key = util::coordinate_key(&at)?;
            let site = session
                .oneshot(|c| async move { c.require_site(&key) })
                .await?;

            let view = SiteView::from(site.as_ref());
            let out = output::render_single(
                &global.output,
                &view,
                |s| site_detail(s, colored),
                |s| s.key.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Report {
            at,
            kind,
            wait,
            unavailable,
            comment,
        } => {
            let report = SiteReport {
                latitude: at.latitude,
                longitude: at.longitude,
                kind: util::site_kind(kind),
                wait_time_minutes: wait,
                available: !unavailable,
                comment,
            };
            let result = session
                .oneshot(|c| async move { c.execute(CoreCommand::ReportSite(report)).await })
                .await?;

            if let CommandResult::Reported { key, comment } = result {
                if !global.quiet {
                    eprintln!("Site reported at {}", key.display());
                    if comment.is_some() {
                        eprintln!("Comment added");
                    }
                }
            }
            Ok(())
        }

        SitesCommand::Remove(at) => {
            let key = util::coordinate_key(&at)?;
            let prompt = format!("Remove the site at {}?", key.display());
            if !util::confirm(&prompt, global.yes, "sites remove")? {
                return Ok(());
            }

            let display = key.display();
            session
                .oneshot(|c| async move {
                    let site = c.require_site(&key)?;
                    c.execute(CoreCommand::RemoveSite {
                        kind: site.collection,
                        key,
                    })
                    .await
                })
                .await?;
            if !global.quiet {
                eprintln!("Site at {display} removed");
            }
            Ok(())
        }
    }
}
