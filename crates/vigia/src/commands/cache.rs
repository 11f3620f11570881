//! `vigia cache`: inspect the saved snapshot without touching the network.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vigia_api::DatasetSummary;
use vigia_core::LocalSnapshotStore;

use crate::cli::{CacheArgs, CacheCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SnapshotReport {
    fetched_at: DateTime<Utc>,
    summary: DatasetSummary,
}

fn snapshot_detail(report: Option<&SnapshotReport>) -> String {
    match report {
        None => "No saved snapshot.".into(),
        Some(r) => format!(
            "Saved at:   {}\n{}",
            r.fetched_at.to_rfc3339(),
            output::summary_table(&r.summary)
        ),
    }
}

pub async fn handle(args: CacheArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CacheCommand::Show => {
            let dir = config::resolve_cache_dir(global)?;
            tracing::debug!(dir = %dir.display(), "reading snapshot");

            let report = LocalSnapshotStore::file(dir)
                .load()
                .await
                .map(|snap| SnapshotReport {
                    fetched_at: snap.fetched_at,
                    summary: snap.payload.summary(),
                });
            let out = output::render_single(&global.output, &report, |r| {
                snapshot_detail(r.as_ref())
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
