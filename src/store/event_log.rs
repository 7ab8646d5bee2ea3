//! Append-only record of the protocol messages a node accepts.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Result, RumorError};

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, entry: &str) -> Result<()>;
}

/// Appends one line per entry to a file
pub struct FileEventLog {
    path: PathBuf,
    // serializes appends from concurrent handlers
    write_lock: AsyncMutex<()>,
}

impl FileEventLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: AsyncMutex::new(()),
        }
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(&self, entry: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", entry).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps entries in memory; used by tests and the status API
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, entry: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| RumorError::Concurrency(format!("Mutex lock fail {}", e)))?
            .push(entry.to_string());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullEventLog;

#[async_trait]
impl EventLog for NullEventLog {
    async fn append(&self, _entry: &str) -> Result<()> {
        Ok(())
    }
}
