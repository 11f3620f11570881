//! Clap derive structures for the `vigia` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vigia -- resilient public-safety feed client
#[derive(Debug, Parser)]
#[command(
    name = "vigia",
    version,
    about = "Fetch the public-safety operational feed, with offline fallback",
    long_about = "Fetches alerts, sirens, cameras, weather and support points from the\n\
        operational feed. Transient failures are retried with backoff; when the\n\
        feed cannot be reached the last saved snapshot is served instead.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Feed profile to use
    #[arg(long, short = 'p', env = "VIGIA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Feed URL (overrides profile)
    #[arg(long, short = 'e', env = "VIGIA_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Output format (default: `defaults.output` from the config file, else table)
    #[arg(
        long = "output",
        short = 'o',
        env = "VIGIA_OUTPUT",
        value_name = "FORMAT",
        global = true
    )]
    pub output_flag: Option<OutputFormat>,

    /// When to use color output (default: `defaults.color`, else auto)
    #[arg(long = "color", value_name = "WHEN", global = true)]
    pub color_flag: Option<ColorMode>,

    /// Effective output format, filled in by `config::apply_display_defaults`.
    #[arg(skip)]
    pub output: OutputFormat,

    #[arg(skip)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates (staging feeds)
    #[arg(long, short = 'k', env = "VIGIA_INSECURE", global = true)]
    pub insecure: bool,

    /// Fetch deadline in seconds (overrides profile)
    #[arg(long, env = "VIGIA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    #[default]
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one sync cycle and print the outcome
    ///
    /// Exit code 0 = fresh data, 10 = serving saved data, 11 = no data.
    Sync(SyncArgs),

    /// Keep syncing and print every state transition
    Watch(WatchArgs),

    /// Inspect the saved snapshot
    Cache(CacheArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Include the full dataset in structured output
    #[arg(long)]
    pub payload: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// `host:port` to probe for reachability (overrides profile)
    #[arg(long)]
    pub probe: Option<String>,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Summarize the saved snapshot
    Show,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a config file with guided setup
    Init,

    /// Display the current configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Store a feed token in the system keyring
    SetToken,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
