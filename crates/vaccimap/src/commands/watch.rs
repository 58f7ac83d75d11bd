//! `watch`: stream registry changes until interrupted.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use vaccimap_core::{Controller, CoordinateKey, SiteFilter, SiteRecord};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::sites::SiteView;
use super::{Session, util};

type Visible = BTreeMap<CoordinateKey, Arc<SiteRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Change {
    Added,
    Changed,
    Removed,
}

impl Change {
    fn marker(self) -> char {
        match self {
            Self::Added => '+',
            Self::Changed => '~',
            Self::Removed => '-',
        }
    }
}

#[derive(Serialize)]
struct ChangeEvent {
    at: String,
    change: Change,
    site: SiteView,
}

pub async fn handle(session: Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = util::site_filter(&args.filter);
    let sync_timeout = session.config.sync_timeout;

    let controller = Controller::new(session.config, session.store);
    controller.connect().await?;

    let spinner = sync_spinner(global.quiet);
    let synced = controller.wait_for_sync(sync_timeout).await;
    spinner.finish_and_clear();
    if let Err(e) = synced {
        controller.disconnect().await;
        return Err(e.into());
    }

    let result = stream_changes(&controller, &filter, args.count, global).await;
    controller.disconnect().await;
    result
}

async fn stream_changes(
    controller: &Controller,
    filter: &SiteFilter,
    count: Option<u64>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let colored = output::should_color(&global.color);
    let mut stream = controller.sites();

    // Sites present at startup are reported as added.
    let mut previous = visible(stream.current(), filter);
    emit(&diff(&Visible::new(), &previous), global, colored)?;

    let mut batches = 0;
    loop {
        if count.is_some_and(|n| batches >= n) {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            snapshot = stream.changed() => {
                let Some(snapshot) = snapshot else {
                    return Err(CliError::Disconnected);
                };
                let current = visible(&snapshot, filter);
                let changes = diff(&previous, &current);
                if !changes.is_empty() {
                    emit(&changes, global, colored)?;
                    batches += 1;
                }
                previous = current;
            }
        }
    }
}

fn visible(snapshot: &[Arc<SiteRecord>], filter: &SiteFilter) -> Visible {
    snapshot
        .iter()
        .filter(|site| filter.matches(site))
        .map(|site| (site.coordinate_key.clone(), Arc::clone(site)))
        .collect()
}

/// Removals first, then additions and changes, each in key order.
fn diff(previous: &Visible, current: &Visible) -> Vec<(Change, Arc<SiteRecord>)> {
    let removed = previous
        .iter()
        .filter(|(key, _)| !current.contains_key(*key))
        .map(|(_, site)| (Change::Removed, Arc::clone(site)));

    let upserted = current.iter().filter_map(|(key, site)| match previous.get(key) {
        None => Some((Change::Added, Arc::clone(site))),
        Some(old) if old != site => Some((Change::Changed, Arc::clone(site))),
        Some(_) => None,
    });

    removed.chain(upserted).collect()
}

fn emit(
    changes: &[(Change, Arc<SiteRecord>)],
    global: &GlobalOpts,
    colored: bool,
) -> Result<(), CliError> {
    for (change, site) in changes {
        let view = SiteView::from(site.as_ref());
        let line = match global.output {
            OutputFormat::Table | OutputFormat::Plain => format!(
                "{} {} {}  {}  {}  {}  {}",
                Local::now().format("%H:%M:%S"),
                change.marker(),
                view.coordinates,
                view.kind.label(),
                if view.available { "available" } else { "unavailable" },
                util::wait_label(view.wait_time_minutes),
                output::pin_swatch(view.pin, colored),
            ),
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&ChangeEvent {
                at: Utc::now().to_rfc3339(),
                change: *change,
                site: view,
            })?,
            OutputFormat::Yaml => format!(
                "---\n{}",
                serde_yaml::to_string(&ChangeEvent {
                    at: Utc::now().to_rfc3339(),
                    change: *change,
                    site: view,
                })?
            ),
        };
        output::print_output(&line, global.quiet);
    }
    Ok(())
}

fn sync_spinner(quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Syncing sites...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
