// ── Core error types ──
//
// Errors from vigia-core's own plumbing: storage, configuration, lifecycle.
// Fetch failures never appear here. They are classified into `ErrorKind`
// at the data-source boundary and surface only through `SyncState`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage errors ───────────────────────────────────────────────
    #[error("Storage I/O failed for '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Feed client setup failed: {0}")]
    Transport(#[from] vigia_api::Error),

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync orchestrator has shut down")]
    ShutDown,
}
