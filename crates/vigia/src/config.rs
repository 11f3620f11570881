//! CLI configuration: thin wrapper around `vigia_config`.
//!
//! Adds `GlobalOpts` flag overrides (--endpoint, --timeout, --insecure)
//! on top of profile resolution, and fills display options from
//! `[defaults]` when their flags are absent.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use vigia_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use vigia_config::{
    Config, Defaults, Profile, config_path, default_cache_dir, load_config, load_config_or_default,
    profile_to_sync_config, save_config, store_token,
};

/// Settle `output` and `color`: the flag (or its env var) wins, then
/// `[defaults]` from the config file.
pub fn apply_display_defaults(global: &mut GlobalOpts, defaults: &Defaults) -> Result<(), CliError> {
    global.output = match &global.output_flag {
        Some(format) => format.clone(),
        None => parse_default("defaults.output", &defaults.output)?,
    };
    global.color = match &global.color_flag {
        Some(mode) => mode.clone(),
        None => parse_default("defaults.color", &defaults.color)?,
    };
    Ok(())
}

fn parse_default<T: ValueEnum>(field: &str, raw: &str) -> Result<T, CliError> {
    T::from_str(raw, true).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("unknown value '{raw}'"),
    })
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Build a `SyncConfig` from the config file, the active profile, and
/// CLI overrides. Without a profile, `--endpoint` alone is enough.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut sync = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile_to_sync_config(profile, &profile_name, &cfg.defaults)?,
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            let raw = global.endpoint.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let endpoint = parse_endpoint(raw)?;
            let mut sync = SyncConfig::new(endpoint, default_cache_dir(&profile_name));
            sync.feed.request_timeout = Duration::from_secs(cfg.defaults.timeout);
            sync.heartbeat_interval = Duration::from_millis(cfg.defaults.heartbeat_ms);
            sync
        }
    };

    if let Some(ref raw) = global.endpoint {
        sync.feed.endpoint = parse_endpoint(raw)?;
    }
    if let Some(secs) = global.timeout {
        sync.feed.request_timeout = Duration::from_secs(secs);
    }
    if global.insecure {
        sync.feed.tls = TlsVerification::DangerAcceptInvalid;
    }

    sync.validate()?;
    Ok(sync)
}

/// Snapshot directory for the active profile. Needs no endpoint.
pub fn resolve_cache_dir(global: &GlobalOpts) -> Result<PathBuf, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);
    match cfg.profiles.get(&profile_name) {
        Some(profile) => Ok(profile
            .cache_dir
            .clone()
            .unwrap_or_else(|| default_cache_dir(&profile_name))),
        None if global.profile.is_some() => Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        }),
        None => Ok(default_cache_dir(&profile_name)),
    }
}

fn parse_endpoint(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "endpoint".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, ColorMode, OutputFormat};

    fn defaults(output: &str, color: &str) -> Defaults {
        Defaults {
            output: output.into(),
            color: color.into(),
            ..Defaults::default()
        }
    }

    #[test]
    fn config_defaults_fill_absent_flags() {
        let mut cli = Cli::try_parse_from(["vigia", "cache", "show"]).unwrap();
        apply_display_defaults(&mut cli.global, &defaults("json-compact", "never")).unwrap();
        assert_eq!(cli.global.output, OutputFormat::JsonCompact);
        assert_eq!(cli.global.color, ColorMode::Never);
    }

    #[test]
    fn flags_beat_config_defaults() {
        let mut cli =
            Cli::try_parse_from(["vigia", "-o", "yaml", "--color", "always", "cache", "show"])
                .unwrap();
        apply_display_defaults(&mut cli.global, &defaults("json", "never")).unwrap();
        assert_eq!(cli.global.output, OutputFormat::Yaml);
        assert_eq!(cli.global.color, ColorMode::Always);
    }

    #[test]
    fn unknown_default_is_rejected() {
        let mut cli = Cli::try_parse_from(["vigia", "cache", "show"]).unwrap();
        let err = apply_display_defaults(&mut cli.global, &defaults("xml", "auto")).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "defaults.output"));
    }
}
