//! `vigia sync`: one cycle, progress bar, terminal report.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use vigia_core::{CoreError, Phase, SyncOrchestrator, SyncState};

use crate::cli::{GlobalOpts, OutputFormat, SyncArgs};
use crate::config;
use crate::error::{CliError, exit_code};
use crate::output::{self, StateReport};

fn progress_bar(show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn percent(progress: f32) -> u64 {
    (progress.clamp(0.0, 1.0) * 100.0).round() as u64
}

/// Exit code for a terminal phase.
pub fn outcome_code(state: &SyncState) -> i32 {
    match state.phase {
        Phase::Succeeded => exit_code::SUCCESS,
        Phase::OfflineCached => exit_code::OFFLINE_CACHED,
        _ => exit_code::FAILED,
    }
}

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<i32, CliError> {
    let sync_config = config::build_sync_config(global)?;
    tracing::debug!(endpoint = %sync_config.feed.endpoint, "starting sync");

    let orchestrator = SyncOrchestrator::from_config(&sync_config)?;
    let mut stream = orchestrator.state_stream();

    let show_bar = !args.no_progress
        && !global.quiet
        && matches!(global.output, OutputFormat::Table)
        && std::io::stderr().is_terminal();
    let bar = progress_bar(show_bar);

    orchestrator.start()?;

    let terminal = loop {
        let state = stream.changed().await.ok_or(CoreError::ShutDown)?;
        bar.set_position(percent(state.progress));
        bar.set_message(state.status_message.clone());
        if state.cycle > 0 && state.is_terminal() {
            break state;
        }
    };
    bar.finish_and_clear();
    orchestrator.shutdown().await;

    let color = output::should_color(&global.color);
    let report = StateReport::new(&terminal, args.payload);
    let out = output::render_single(&global.output, &report, |r| {
        output::state_detail(r, color)
    })?;
    output::print_output(&out, global.quiet);

    Ok(outcome_code(&terminal))
}
