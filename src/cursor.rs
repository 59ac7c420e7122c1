//! Durable cursor: a single unix-seconds timestamp persisted to a file
//!
//! Reads never fail: an absent or corrupt file falls back to the
//! configured default. Writes are atomic (sibling temp file, fsync,
//! rename) so a reader never observes a truncated value.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::CursorError;

/// High-water mark storage for event processing.
#[async_trait]
pub trait Cursor: Send + Sync {
    /// Last persisted timestamp, or the configured default if none exists
    /// or the stored value cannot be parsed.
    async fn read(&self) -> i64;

    /// Persist a timestamp. Durable before return.
    async fn write(&self, timestamp: i64) -> Result<(), CursorError>;
}

/// Cursor persisted as decimal ASCII in `<dir>/<name>`.
pub struct FileCursor {
    name: String,
    dir: PathBuf,
    default_timestamp: i64,

    // Readers may be concurrent; writers are exclusive. Held across the
    // file I/O so a read never races a rename.
    lock: RwLock<()>,
}

impl FileCursor {
    /// Create a cursor named `name` inside `dir`.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, default_timestamp: i64) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            default_timestamp,
            lock: RwLock::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", self.name))
    }
}

#[async_trait]
impl Cursor for FileCursor {
    async fn read(&self) -> i64 {
        let _guard = self.lock.read().await;

        let path = self.path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    default = self.default_timestamp,
                    "cursor file unreadable, using default"
                );
                return self.default_timestamp;
            }
        };

        match contents.trim().parse::<i64>() {
            Ok(timestamp) => timestamp,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    default = self.default_timestamp,
                    "cursor file corrupt, using default"
                );
                self.default_timestamp
            }
        }
    }

    async fn write(&self, timestamp: i64) -> Result<(), CursorError> {
        let _guard = self.lock.write().await;

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(timestamp.to_string().as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, self.path()).await?;

        tracing::debug!(timestamp, name = %self.name, "cursor advanced");
        Ok(())
    }
}
