//! Resilient data acquisition for the vigia public-safety client.
//!
//! - **[`SyncOrchestrator`]** runs one sync cycle at a time and publishes
//!   [`SyncState`]. UI code only reads that state and calls
//!   [`start()`](SyncOrchestrator::start) / [`retry()`](SyncOrchestrator::retry).
//!
//! - **[`RetryPolicy`]** maps `(attempt, ErrorKind)` to stop-or-wait with
//!   exponential backoff and injected jitter.
//!
//! - **[`ConnectivityMonitor`]** holds raw reachability and emits debounced
//!   transitions; reconnecting after a `NoConnectivity` failure re-runs the
//!   cycle.
//!
//! - **[`LocalSnapshotStore`]** keeps the last good dataset, written
//!   atomically, as the offline fallback.
//!
//! - **[`RemoteDataSource`]** performs one bounded fetch and classifies any
//!   failure into [`ErrorKind`].

pub mod config;
pub mod connectivity;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConnectivityConfig, FeedConfig, RetryConfig, SyncConfig, TlsVerification};
pub use connectivity::{
    ConnectivityChange, ConnectivityMonitor, ReachabilityProbe, ReachabilityReporter, TcpProbe,
};
pub use error::CoreError;
pub use orchestrator::{CycleSettings, SyncDeps, SyncOrchestrator};
pub use retry::{RetryBudget, RetryDecision, RetryPolicy};
pub use snapshot::{BlobStore, CachedSnapshot, FileBlobStore, LocalSnapshotStore, MemoryBlobStore};
pub use source::{ClassifiedFailure, FetchOutcome, HttpDataSource, RemoteDataSource};
pub use state::{ErrorKind, Phase, SyncState};
pub use stream::{StateStream, SyncStateStream};

pub use vigia_api::OperationalDataset;
