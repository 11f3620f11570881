mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    match run(cli).await {
        Ok(exit_code::SUCCESS) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stderr keeps structured stdout output parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch a command; the returned value is the process exit code.
async fn run(mut cli: Cli) -> Result<i32, CliError> {
    config::apply_display_defaults(&mut cli.global, &config::load_config_or_default().defaults)?;
    let global = &cli.global;
    match cli.command {
        Command::Sync(args) => commands::sync::handle(args, global).await,
        Command::Watch(args) => commands::watch::handle(args, global)
            .await
            .map(|()| exit_code::SUCCESS),
        Command::Cache(args) => commands::cache::handle(args, global)
            .await
            .map(|()| exit_code::SUCCESS),
        Command::Config(args) => {
            commands::config_cmd::handle(args, global).map(|()| exit_code::SUCCESS)
        }
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "vigia", &mut std::io::stdout());
            Ok(exit_code::SUCCESS)
        }
    }
}
