//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Tables use `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vigia_api::DatasetSummary;
use vigia_core::{Phase, SyncState};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Phase label, colored by severity when enabled.
pub fn phase_label(phase: Phase, color: bool) -> String {
    let label = phase.to_string();
    if !color {
        return label;
    }
    match phase {
        Phase::Succeeded => label.green().to_string(),
        Phase::OfflineCached | Phase::Retrying => label.yellow().to_string(),
        Phase::Failed => label.red().bold().to_string(),
        Phase::Idle | Phase::Loading => label.cyan().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single item: `detail_fn` for table output, serde otherwise.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Dataset summary table ────────────────────────────────────────────

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Collection")]
    collection: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

pub fn summary_table(summary: &DatasetSummary) -> String {
    let rows = [
        ("alerts", summary.alerts),
        ("sirens", summary.sirens),
        ("cameras", summary.cameras),
        ("weather stations", summary.weather_stations),
        ("support points", summary.support_points),
        ("health units", summary.health_units),
    ]
    .map(|(collection, count)| CountRow { collection, count });

    Table::new(rows).with(Style::rounded()).to_string()
}

fn level(value: Option<u8>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn age(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".into(), |t| t.to_rfc3339())
}

// ── Sync report ──────────────────────────────────────────────────────

/// Structured view of a terminal `SyncState`.
#[derive(Serialize)]
pub struct StateReport<'a> {
    pub phase: Phase,
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<vigia_core::ErrorKind>,
    pub attempt: u32,
    pub cycle: u64,
    pub data_as_of: Option<DateTime<Utc>>,
    pub summary: Option<DatasetSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<&'a vigia_core::OperationalDataset>,
}

impl<'a> StateReport<'a> {
    pub fn new(state: &'a SyncState, include_payload: bool) -> Self {
        Self {
            phase: state.phase,
            status: &state.status_message,
            error_kind: state.error_kind,
            attempt: state.attempt,
            cycle: state.cycle,
            data_as_of: state.data_as_of,
            summary: state.payload.as_ref().map(|p| p.summary()),
            payload: state
                .payload
                .as_deref()
                .filter(|_| include_payload),
        }
    }
}

/// Human-readable report for table output.
pub fn state_detail(report: &StateReport<'_>, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Phase:      {}\n", phase_label(report.phase, color)));
    out.push_str(&format!("Status:     {}\n", report.status));
    if let Some(kind) = report.error_kind {
        out.push_str(&format!("Error:      {kind}\n"));
    }
    out.push_str(&format!("Retries:    {}\n", report.attempt));
    out.push_str(&format!("Data as of: {}\n", age(report.data_as_of)));
    if let Some(ref summary) = report.summary {
        out.push_str(&format!("Stage:      {}\n", level(summary.stage)));
        out.push_str(&format!("Heat level: {}\n", level(summary.heat_level)));
        out.push_str(&summary_table(summary));
    }
    out.trim_end().to_owned()
}
