//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use vigia_config::ConfigError;
use vigia_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const STORAGE: i32 = 4;
    /// Sync fell back to the saved snapshot.
    pub const OFFLINE_CACHED: i32 = 10;
    /// Sync produced no data at all.
    pub const FAILED: i32 = 11;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vigia::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vigia config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No feed endpoint configured")]
    #[diagnostic(
        code(vigia::no_config),
        help(
            "Create a profile with: vigia config init\n\
             Expected at: {path}\n\
             Or pass --endpoint <URL>."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(vigia::config))]
    Config(ConfigError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vigia::validation))]
    Validation { field: String, reason: String },

    // ── Engine ───────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(vigia::core))]
    Core(#[from] CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(vigia::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(vigia::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            Self::Core(CoreError::Config { .. }) => exit_code::CONFIG,
            Self::Core(CoreError::Storage { .. }) => exit_code::STORAGE,
            _ => exit_code::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_maps_to_usage() {
        let err = CliError::from(ConfigError::Validation {
            field: "endpoint".into(),
            reason: "invalid URL".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn core_config_maps_to_config_exit() {
        let err = CliError::from(CoreError::Config {
            message: "bad".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }
}
