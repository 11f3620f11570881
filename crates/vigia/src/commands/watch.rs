//! `vigia watch`: long-running sync with live transitions.
//!
//! Reads stdin while running: `r` retries, `q` quits.

use std::net::ToSocketAddrs;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use vigia_core::{SyncOrchestrator, SyncState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

fn transition_line(state: &SyncState, color: bool) -> String {
    let mut line = format!(
        "[cycle {}] {:<14} {:>3}%  {}",
        state.cycle,
        output::phase_label(state.phase, color),
        (state.progress * 100.0).round(),
        state.status_message
    );
    if let Some(kind) = state.error_kind {
        line.push_str(&format!("  ({kind})"));
    }
    if state.is_terminal() {
        if let Some(ref payload) = state.payload {
            let s = payload.summary();
            line.push_str(&format!(
                "  alerts={} sirens={} stage={}",
                s.alerts,
                s.sirens,
                s.stage.map_or_else(|| "-".into(), |v| v.to_string())
            ));
        }
    }
    line
}

fn render(state: &SyncState, global: &GlobalOpts, color: bool) -> Result<String, CliError> {
    match global.output {
        OutputFormat::Table => Ok(transition_line(state, color)),
        // One document per line so the stream stays machine-readable.
        OutputFormat::Json | OutputFormat::JsonCompact => {
            Ok(serde_json::to_string(&output::StateReport::new(state, false))?)
        }
        OutputFormat::Yaml => Ok(format!(
            "---\n{}",
            serde_yaml::to_string(&output::StateReport::new(state, false))?
        )),
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut sync_config = config::build_sync_config(global)?;
    if let Some(ref raw) = args.probe {
        let addr = raw
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| CliError::Validation {
                field: "probe".into(),
                reason: format!("cannot resolve {raw}"),
            })?;
        sync_config.connectivity.probe_target = Some(addr);
    }

    let orchestrator = SyncOrchestrator::from_config(&sync_config)?;
    let mut transitions = orchestrator.transitions();
    let color = output::should_color(&global.color);

    if !global.quiet {
        eprintln!("Watching {} (r + Enter = retry, q = quit, Ctrl-C = exit)", sync_config.feed.endpoint);
    }
    orchestrator.start()?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = transitions.recv() => match received {
                Ok(state) => output::print_output(&render(&state, global, color)?, global.quiet),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "output fell behind; transitions skipped");
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line? {
                Some(cmd) => match cmd.trim() {
                    "r" | "retry" => orchestrator.retry()?,
                    "q" | "quit" => break,
                    "" => {}
                    other => eprintln!("unknown command '{other}' (r = retry, q = quit)"),
                },
                None => stdin_open = false,
            },
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vigia_core::{ErrorKind, OperationalDataset, Phase};

    use super::*;

    #[test]
    fn terminal_line_includes_summary() {
        let state = SyncState {
            phase: Phase::Succeeded,
            payload: Some(Arc::new(OperationalDataset {
                stage: Some(3),
                ..OperationalDataset::default()
            })),
            progress: 1.0,
            status_message: "up_to_date".into(),
            cycle: 2,
            ..SyncState::idle()
        };
        let line = transition_line(&state, false);
        assert!(line.starts_with("[cycle 2] succeeded"));
        assert!(line.contains("100%"));
        assert!(line.contains("stage=3"));
    }

    #[test]
    fn retrying_line_shows_error_kind() {
        let state = SyncState {
            phase: Phase::Retrying,
            error_kind: Some(ErrorKind::ServerError),
            attempt: 1,
            progress: 0.3,
            status_message: "retrying:1".into(),
            cycle: 1,
            ..SyncState::idle()
        };
        let line = transition_line(&state, false);
        assert!(line.contains("retrying:1"));
        assert!(line.contains("(server_error)"));
    }
}
