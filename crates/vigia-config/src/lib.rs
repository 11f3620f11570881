//! Shared configuration for vigia front-ends.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `vigia_core::SyncConfig`. The CLI layers its flag
//! overrides on top of this.

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use vigia_core::{SyncConfig, TlsVerification};

const KEYRING_SERVICE: &str = "vigia";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named feed profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick the profile to use: explicit name, then `default_profile`.
    pub fn resolve_profile<'a>(
        &'a self,
        explicit: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = explicit
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// CLI output format when `--output` is not given.
    #[serde(default = "default_output")]
    pub output: String,

    /// CLI color mode when `--color` is not given.
    #[serde(default = "default_color")]
    pub color: String,

    /// Fetch deadline in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_heartbeat_ms() -> u64 {
    250
}

/// A named feed profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Operational feed URL.
    pub endpoint: String,

    /// Snapshot directory. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    /// Bearer token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification.
    pub insecure: Option<bool>,

    /// Override the fetch deadline (seconds).
    pub timeout: Option<u64>,

    /// `host:port` probed by TCP connect to detect reachability.
    pub probe: Option<String>,

    pub debounce_ms: Option<u64>,

    #[serde(default)]
    pub retry: RetryOverrides,
}

/// Per-profile overrides of the backoff schedule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RetryOverrides {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub jitter_ratio: Option<f64>,
    pub max_attempts: Option<u32>,
    pub retry_unknown: Option<bool>,
    /// Fixed jitter seed, for reproducible runs.
    pub seed: Option<u64>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vigia", "vigia")
}

fn dirs_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("vigia");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default snapshot directory for a profile.
pub fn default_cache_dir(profile_name: &str) -> PathBuf {
    project_dirs()
        .map_or_else(|| dirs_fallback(".cache"), |dirs| dirs.cache_dir().to_path_buf())
        .join(profile_name)
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layering defaults → TOML → `VIGIA_*` env.
///
/// Nested keys use a double underscore, e.g. `VIGIA_DEFAULTS__TIMEOUT=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIGIA_").split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the feed token: env var, then keyring, then plaintext.
/// Public feeds need none.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Store a profile's feed token in the system keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| invalid("token", format!("keyring: {e}")))
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_probe(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.to_socket_addrs()
        .map_err(|e| invalid("probe", format!("{raw}: {e}")))?
        .next()
        .ok_or_else(|| invalid("probe", format!("{raw}: no address")))
}

/// Build a `SyncConfig` from a profile, with file-level defaults applied.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let endpoint: url::Url = profile
        .endpoint
        .parse()
        .map_err(|_| invalid("endpoint", format!("invalid URL: {}", profile.endpoint)))?;

    let cache_dir = profile
        .cache_dir
        .clone()
        .unwrap_or_else(|| default_cache_dir(profile_name));

    let mut cfg = SyncConfig::new(endpoint, cache_dir);

    cfg.feed.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    cfg.feed.auth_token = resolve_token(profile, profile_name);
    cfg.feed.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.heartbeat_interval = Duration::from_millis(defaults.heartbeat_ms);

    if let Some(ref probe) = profile.probe {
        cfg.connectivity.probe_target = Some(parse_probe(probe)?);
    }
    if let Some(ms) = profile.debounce_ms {
        cfg.connectivity.debounce = Duration::from_millis(ms);
    }

    let retry = &profile.retry;
    if let Some(ms) = retry.base_delay_ms {
        cfg.retry.base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = retry.max_delay_ms {
        cfg.retry.max_delay = Duration::from_millis(ms);
    }
    if let Some(m) = retry.multiplier {
        cfg.retry.multiplier = m;
    }
    if let Some(j) = retry.jitter_ratio {
        cfg.retry.jitter_ratio = j;
    }
    if let Some(n) = retry.max_attempts {
        cfg.retry.max_attempts = n;
    }
    if let Some(flag) = retry.retry_unknown {
        cfg.retry.retry_unknown = flag;
    }
    cfg.jitter_seed = retry.seed;

    cfg.validate()
        .map_err(|e| invalid(&format!("profile '{profile_name}'"), e.to_string()))?;
    Ok(cfg)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "rio"

[defaults]
timeout = 20
output = "yaml"

[profiles.rio]
endpoint = "https://feed.example/v1/operational"
cache_dir = "/var/cache/vigia"
probe = "127.0.0.1:443"
debounce_ms = 750

[profiles.rio.retry]
max_attempts = 5
seed = 7

[profiles.staging]
endpoint = "https://staging.example/v1/operational"
insecure = true
timeout = 3
"#;

    fn load(body: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 15);
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.color, "auto");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn partial_defaults_table_keeps_other_keys() {
        let cfg = load(SAMPLE);
        assert_eq!(cfg.defaults.output, "yaml");
        assert_eq!(cfg.defaults.color, "auto");
        assert_eq!(cfg.defaults.timeout, 20);
    }

    #[test]
    fn profile_translates_to_sync_config() {
        let cfg = load(SAMPLE);
        let (name, profile) = cfg.resolve_profile(None).unwrap();
        assert_eq!(name, "rio");

        let sync = profile_to_sync_config(profile, name, &cfg.defaults).unwrap();
        assert_eq!(sync.feed.endpoint.as_str(), "https://feed.example/v1/operational");
        assert_eq!(sync.cache_dir, PathBuf::from("/var/cache/vigia"));
        assert_eq!(sync.feed.request_timeout, Duration::from_secs(20));
        assert_eq!(sync.feed.tls, TlsVerification::SystemDefaults);
        assert_eq!(sync.retry.max_attempts, 5);
        assert_eq!(sync.jitter_seed, Some(7));
        assert_eq!(sync.connectivity.debounce, Duration::from_millis(750));
        assert_eq!(
            sync.connectivity.probe_target,
            Some("127.0.0.1:443".parse().unwrap())
        );
    }

    #[test]
    fn profile_overrides_defaults() {
        let cfg = load(SAMPLE);
        let (name, profile) = cfg.resolve_profile(Some("staging")).unwrap();
        let sync = profile_to_sync_config(profile, name, &cfg.defaults).unwrap();
        assert_eq!(sync.feed.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(sync.feed.request_timeout, Duration::from_secs(3));
        assert_eq!(sync.cache_dir, default_cache_dir("staging"));
    }

    #[test]
    fn unknown_profile_is_reported() {
        let cfg = load(SAMPLE);
        assert!(matches!(
            cfg.resolve_profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn short_debounce_fails_validation() {
        let profile = Profile {
            endpoint: "https://feed.example/".into(),
            debounce_ms: Some(100),
            ..Profile::default()
        };
        let err = profile_to_sync_config(&profile, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn bad_endpoint_fails_validation() {
        let profile = Profile {
            endpoint: "not a url".into(),
            ..Profile::default()
        };
        let err = profile_to_sync_config(&profile, "x", &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn plaintext_token_is_the_last_resort() {
        let profile = Profile {
            endpoint: "https://feed.example/".into(),
            token: Some("plain".into()),
            token_env: Some("VIGIA_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        let token = resolve_token(&profile, "vigia-test-no-keyring-entry").unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                endpoint: "https://feed.example/v1/operational".into(),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(
            loaded.profiles["default"].endpoint,
            "https://feed.example/v1/operational"
        );
    }
}
