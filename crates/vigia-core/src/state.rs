// ── Published sync state ──
//
// The single value the orchestrator publishes to consumers. Every
// transition replaces the whole value, so a subscriber never sees a
// phase paired with a payload or error from a different transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use vigia_api::OperationalDataset;

/// Where the current (or last) cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Retrying,
    Succeeded,
    OfflineCached,
    Failed,
}

impl Phase {
    /// No further automatic transition happens from a terminal phase
    /// without a new trigger.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::OfflineCached | Self::Failed)
    }
}

/// Classified failure of a fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NoConnectivity,
    Timeout,
    NoData,
    ServerError,
    Unknown,
}

/// Locale-neutral status keys; the UI owns translation.
pub mod status {
    pub const IDLE: &str = "idle";
    pub const CHECKING_CONNECTIVITY: &str = "checking_connectivity";
    pub const FETCHING: &str = "fetching";
    pub const UP_TO_DATE: &str = "up_to_date";
    pub const USING_SAVED_DATA: &str = "using_saved_data";
    pub const FAILED: &str = "failed";

    /// `retrying:<attempt>`
    pub fn retrying(attempt: u32) -> String {
        format!("retrying:{attempt}")
    }
}

/// Snapshot of the sync engine as seen by consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub phase: Phase,
    /// Present in `Succeeded` / `OfflineCached`; carried over from the last
    /// success while `Loading` / `Retrying`.
    pub payload: Option<Arc<OperationalDataset>>,
    pub error_kind: Option<ErrorKind>,
    /// Retries performed in the current cycle.
    pub attempt: u32,
    /// In `[0, 1]`, never decreasing within a cycle.
    pub progress: f32,
    pub status_message: String,
    /// Incremented at every cycle start; 0 before the first cycle.
    pub cycle: u64,
    /// When the shown payload was fetched.
    pub data_as_of: Option<DateTime<Utc>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::idle()
    }
}

impl SyncState {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            payload: None,
            error_kind: None,
            attempt: 0,
            progress: 0.0,
            status_message: status::IDLE.into(),
            cycle: 0,
            data_as_of: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Serving stale data because the live fetch failed.
    pub fn is_degraded(&self) -> bool {
        self.phase == Phase::OfflineCached
    }

    /// Nothing to show; the UI should block with a retry affordance.
    pub fn is_blocking_error(&self) -> bool {
        self.phase == Phase::Failed
    }

    /// Check the phase/field invariants. Used by tests and debug assertions.
    pub fn is_well_formed(&self) -> bool {
        let payload_ok = match self.phase {
            Phase::Succeeded | Phase::OfflineCached => self.payload.is_some(),
            Phase::Failed => self.payload.is_none(),
            _ => true,
        };
        let error_ok = match self.phase {
            Phase::Retrying | Phase::Failed | Phase::OfflineCached => self.error_kind.is_some(),
            Phase::Succeeded | Phase::Loading | Phase::Idle => self.error_kind.is_none(),
        };
        payload_ok && error_ok && (0.0..=1.0).contains(&self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_well_formed() {
        let state = SyncState::idle();
        assert!(state.is_well_formed());
        assert!(!state.is_terminal());
        assert_eq!(state.status_message, "idle");
    }

    #[test]
    fn succeeded_without_payload_is_malformed() {
        let state = SyncState {
            phase: Phase::Succeeded,
            progress: 1.0,
            ..SyncState::idle()
        };
        assert!(!state.is_well_formed());
    }

    #[test]
    fn failed_requires_error_kind() {
        let mut state = SyncState {
            phase: Phase::Failed,
            progress: 1.0,
            ..SyncState::idle()
        };
        assert!(!state.is_well_formed());
        state.error_kind = Some(ErrorKind::Timeout);
        assert!(state.is_well_formed());
        assert!(state.is_blocking_error());
    }

    #[test]
    fn keys_are_snake_case() {
        assert_eq!(Phase::OfflineCached.to_string(), "offline_cached");
        assert_eq!(ErrorKind::NoConnectivity.to_string(), "no_connectivity");
        assert_eq!(status::retrying(2), "retrying:2");
    }
}
