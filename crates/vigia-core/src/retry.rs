//! Retry policy: pure mapping from (attempt, failure kind) to a decision.
//!
//! Backoff is exponential with jitter:
//!
//! `delay = min(min(base * multiplier^attempt, max) * (1 ± jitter), max)`
//!
//! The jitter sample is an explicit input. [`RetryPolicy::decide_with_jitter`]
//! is fully deterministic; [`RetryPolicy::decide`] draws the sample from a
//! caller-owned RNG so tests can seed it.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::state::ErrorKind;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up on live data for this cycle.
    Stop,
    /// Wait, then attempt again.
    WaitThen(Duration),
}

/// Retries spent in one cycle, per failure category.
///
/// `NoData` shares the server bucket: an empty payload is a server-side
/// fault, so it draws down the same ceiling as `ServerError`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryBudget {
    timeout: u32,
    server: u32,
    unknown: u32,
    no_data: u32,
}

impl RetryBudget {
    /// Retries already spent in `kind`'s category.
    pub fn used(&self, kind: ErrorKind) -> u32 {
        match kind {
            ErrorKind::Timeout => self.timeout,
            ErrorKind::ServerError | ErrorKind::NoData => self.server,
            ErrorKind::Unknown => self.unknown,
            ErrorKind::NoConnectivity => 0,
        }
    }

    /// Retries spent on `NoData` specifically.
    pub fn no_data_used(&self) -> u32 {
        self.no_data
    }

    pub fn charge(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Timeout => self.timeout += 1,
            ErrorKind::ServerError => self.server += 1,
            ErrorKind::NoData => {
                self.server += 1;
                self.no_data += 1;
            }
            ErrorKind::Unknown => self.unknown += 1,
            ErrorKind::NoConnectivity => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Highest attempt count at which `kind` is still retried.
    pub fn ceiling(&self, kind: ErrorKind) -> u32 {
        match kind {
            // Retrying on a timer against a dead network is wasted work;
            // reconnection triggers the next cycle instead.
            ErrorKind::NoConnectivity => 0,
            ErrorKind::Timeout | ErrorKind::ServerError => self.config.max_attempts,
            ErrorKind::NoData => self.config.no_data_retries.min(self.config.max_attempts),
            ErrorKind::Unknown if self.config.retry_unknown => self.config.max_attempts,
            ErrorKind::Unknown => 0,
        }
    }

    /// Reclassify `NoData` as `ServerError` once its own retries are spent.
    pub fn effective_kind(&self, kind: ErrorKind, no_data_retries_used: u32) -> ErrorKind {
        if kind == ErrorKind::NoData && no_data_retries_used >= self.config.no_data_retries {
            ErrorKind::ServerError
        } else {
            kind
        }
    }

    /// Deterministic decision given a jitter sample `unit` in `[0, 1)`.
    pub fn decide_with_jitter(&self, attempt: u32, kind: ErrorKind, unit: f64) -> RetryDecision {
        if attempt >= self.ceiling(kind) {
            return RetryDecision::Stop;
        }
        RetryDecision::WaitThen(self.backoff(attempt, unit))
    }

    /// Decision with the jitter sample drawn from `rng`.
    ///
    /// The RNG is only consulted when a wait is actually scheduled.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        kind: ErrorKind,
        rng: &mut R,
    ) -> RetryDecision {
        if attempt >= self.ceiling(kind) {
            return RetryDecision::Stop;
        }
        self.decide_with_jitter(attempt, kind, rng.r#gen::<f64>())
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32, unit: f64) -> Duration {
        let max = self.config.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.config.base_delay.as_secs_f64() * self.config.multiplier.powi(exponent);
        let capped = raw.min(max);

        let unit = unit.clamp(0.0, 1.0);
        let jitter_factor = 1.0 + self.config.jitter_ratio * (2.0 * unit - 1.0);
        let with_jitter = (capped * jitter_factor).clamp(0.0, max);

        Duration::from_secs_f64(with_jitter)
    }
}
