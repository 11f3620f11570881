// ── Runtime sync configuration ──
//
// These types describe *how* the engine fetches, retries, and watches the
// network. They never touch disk: `vigia-config` (or an embedding app)
// constructs a `SyncConfig` and hands it in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Debounce windows shorter than this let flapping links storm subscribers.
pub const MIN_DEBOUNCE: Duration = Duration::from_millis(500);

/// TLS verification strategy for the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (staging feeds only).
    DangerAcceptInvalid,
}

/// Where and how to reach the operational feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: Url,
    pub tls: TlsVerification,
    pub auth_token: Option<SecretString>,
    /// Bounded deadline for one fetch; exceeding it classifies as `Timeout`.
    pub request_timeout: Duration,
}

/// Backoff and retry ceilings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Relative spread applied to each delay, e.g. `0.25` = ±25%.
    pub jitter_ratio: f64,
    /// Retry ceiling for `Timeout` and `ServerError`.
    pub max_attempts: u32,
    /// Retries granted to `NoData` before it is treated as `ServerError`.
    pub no_data_retries: u32,
    /// Whether `Unknown` failures are retried like server errors.
    pub retry_unknown: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.25,
            max_attempts: 3,
            no_data_retries: 1,
            retry_unknown: false,
        }
    }
}

/// Reachability probing and debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityConfig {
    pub debounce: Duration,
    /// Host probed by TCP connect when no platform signal is wired in.
    pub probe_target: Option<SocketAddr>,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            debounce: MIN_DEBOUNCE,
            probe_target: None,
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub feed: FeedConfig,
    pub retry: RetryConfig,
    pub connectivity: ConnectivityConfig,
    /// Directory holding the cached snapshot.
    pub cache_dir: PathBuf,
    /// How often progress advances while a fetch is in flight.
    pub heartbeat_interval: Duration,
    /// Seed for backoff jitter. `None` seeds from OS entropy at construction.
    pub jitter_seed: Option<u64>,
}

impl SyncConfig {
    pub fn new(endpoint: Url, cache_dir: PathBuf) -> Self {
        Self {
            feed: FeedConfig {
                endpoint,
                tls: TlsVerification::default(),
                auth_token: None,
                request_timeout: Duration::from_secs(15),
            },
            retry: RetryConfig::default(),
            connectivity: ConnectivityConfig::default(),
            cache_dir,
            heartbeat_interval: Duration::from_millis(250),
            jitter_seed: None,
        }
    }

    /// Reject settings the engine cannot honor.
    pub fn validate(&self) -> Result<(), CoreError> {
        let retry = &self.retry;
        if retry.multiplier < 1.0 || !retry.multiplier.is_finite() {
            return Err(invalid("retry.multiplier must be a finite value >= 1"));
        }
        if !(0.0..1.0).contains(&retry.jitter_ratio) {
            return Err(invalid("retry.jitter_ratio must be in [0, 1)"));
        }
        if retry.max_delay < retry.base_delay {
            return Err(invalid("retry.max_delay must be >= retry.base_delay"));
        }
        if self.connectivity.debounce < MIN_DEBOUNCE {
            return Err(invalid("connectivity.debounce must be at least 500ms"));
        }
        if self.feed.request_timeout.is_zero() {
            return Err(invalid("feed.request_timeout must be non-zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(invalid("heartbeat_interval must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig::new(
            "https://feed.example/v1/operational".parse().unwrap(),
            PathBuf::from("/tmp/vigia"),
        )
    }

    #[test]
    fn defaults_validate() {
        config().validate().unwrap();
        let retry = RetryConfig::default();
        assert_eq!(retry.base_delay, Duration::from_secs(1));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
        assert_eq!(retry.max_attempts, 3);
    }

    #[test]
    fn short_debounce_is_rejected() {
        let mut cfg = config();
        cfg.connectivity.debounce = Duration::from_millis(100);
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let mut cfg = config();
        cfg.retry.multiplier = 0.5;
        assert!(cfg.validate().is_err());
    }
}
