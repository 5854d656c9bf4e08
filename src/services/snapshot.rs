//! Durable persistence for the queue snapshot.
//!
//! One JSON document, written on every queue mutation and read once at
//! startup. When the configured location is unusable the system degrades to
//! an in-memory store instead of failing startup.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::models::queue::QueueSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the persisted snapshot; `Ok(None)` when none exists yet.
    async fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError>;

    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError>;
}

/// File-backed store: the snapshot lives in a single JSON file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Creates the parent directory eagerly so an unusable location is
    /// detected at startup, where the caller can fall back to memory.
    pub fn new(path: PathBuf) -> Result<Self, SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec(snapshot)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

/// In-memory fallback; queue state does not survive a restart.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<QueueSnapshot>>,
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<QueueSnapshot>, SnapshotError> {
        Ok(self.inner.lock().expect("snapshot lock poisoned").clone())
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), SnapshotError> {
        *self.inner.lock().expect("snapshot lock poisoned") = Some(snapshot.clone());
        Ok(())
    }
}
