//! Seed registry persistence.
//!
//! The seed keeps its registered peers in memory and rewrites the whole
//! snapshot through a [`RegistryStore`] after every change.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, RumorError};
use crate::registry_error;
use crate::node::NodeAddress;
use crate::settings::DEFAULT_HOST;

/// Durable list of registered peers. `save` replaces the whole list atomically.
///
/// The seed only ever writes; a restarted seed starts from an empty list.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn save(&self, peers: &[NodeAddress]) -> Result<()>;
}

/// One `host:port` per line
pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current snapshot back, for inspection tooling and tests
    pub async fn load(&self) -> Result<Vec<NodeAddress>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RumorError::Io(e)),
        };
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                NodeAddress::parse_with_default_host(line, DEFAULT_HOST).map_err(|e| {
                    registry_error!("{}: bad entry {:?}: {}", self.path.display(), line, e)
                })
            })
            .collect()
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn save(&self, peers: &[NodeAddress]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut contents = String::new();
        for peer in peers {
            contents.push_str(&peer.to_string());
            contents.push('\n');
        }

        // Write beside the target then rename so readers never see a partial list
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), peers = peers.len(), "saved registry snapshot");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    peers: Mutex<Vec<NodeAddress>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<NodeAddress> {
        self.peers.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn save(&self, peers: &[NodeAddress]) -> Result<()> {
        let mut guard = self
            .peers
            .lock()
            .map_err(|e| RumorError::Concurrency(format!("Mutex lock fail {}", e)))?;
        *guard = peers.to_vec();
        Ok(())
    }
}
