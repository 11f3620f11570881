// ── Local snapshot store ──
//
// Persists the last successful dataset so a later failed cycle can fall
// back to it. Writes go through a temp file and a rename, so a crash
// mid-write leaves either the old snapshot or the new one, never a torn mix.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use vigia_api::OperationalDataset;

use crate::error::CoreError;

/// Key under which the operational snapshot is stored.
pub const SNAPSHOT_KEY: &str = "operational-snapshot";

const ENVELOPE_VERSION: u32 = 1;

// ── Blob storage ─────────────────────────────────────────────────────

/// Durable key → bytes storage. Writes must be atomic per key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.tmp"))
    }
}

fn storage_error(key: &str) -> impl FnOnce(io::Error) -> CoreError + '_ {
    move |source| CoreError::Storage {
        key: key.to_owned(),
        source,
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(key)(e)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(storage_error(key))?;

        let temp = self.temp_path_for(key);
        let mut file = fs::File::create(&temp).await.map_err(storage_error(key))?;
        file.write_all(&value).await.map_err(storage_error(key))?;
        file.sync_all().await.map_err(storage_error(key))?;
        drop(file);

        fs::rename(&temp, self.path_for(key))
            .await
            .map_err(storage_error(key))?;

        // Persist the rename itself. Not every platform can open a directory.
        #[cfg(unix)]
        if let Ok(dir) = fs::File::open(&self.dir).await {
            let _ = dir.sync_all().await;
        }

        debug!(key, bytes = value.len(), "blob written");
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError> {
        self.blobs.insert(key.to_owned(), value);
        Ok(())
    }
}

// ── Snapshot envelope ────────────────────────────────────────────────

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    fetched_at: DateTime<Utc>,
    payload: &'a OperationalDataset,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    fetched_at: DateTime<Utc>,
    payload: OperationalDataset,
}

/// A dataset read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub payload: Arc<OperationalDataset>,
    pub fetched_at: DateTime<Utc>,
}

/// The last successful dataset, persisted across restarts.
#[derive(Clone)]
pub struct LocalSnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl LocalSnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// File-backed store rooted at `dir`.
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileBlobStore::new(dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBlobStore::new()))
    }

    /// Persist `dataset`, replacing any previous snapshot. Returns the
    /// timestamp recorded with it.
    pub async fn save(&self, dataset: &OperationalDataset) -> Result<DateTime<Utc>, CoreError> {
        let fetched_at = Utc::now();
        let bytes = serde_json::to_vec(&EnvelopeRef {
            version: ENVELOPE_VERSION,
            fetched_at,
            payload: dataset,
        })?;
        self.blobs.set(SNAPSHOT_KEY, bytes).await?;
        Ok(fetched_at)
    }

    /// The last saved snapshot, or `None` if nothing usable is stored.
    ///
    /// Unreadable or corrupt data is logged and treated as absent: a bad
    /// cache must never take down the fallback path.
    pub async fn load(&self) -> Option<CachedSnapshot> {
        let bytes = match self.blobs.get(SNAPSHOT_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "snapshot read failed");
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "snapshot is corrupt; ignoring");
                return None;
            }
        };

        if envelope.version != ENVELOPE_VERSION {
            warn!(
                version = envelope.version,
                expected = ENVELOPE_VERSION,
                "snapshot version mismatch; ignoring"
            );
            return None;
        }

        Some(CachedSnapshot {
            payload: Arc::new(envelope.payload),
            fetched_at: envelope.fetched_at,
        })
    }
}
