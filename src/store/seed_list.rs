//! Shared seed configuration file.
//!
//! Seeds append themselves on startup; peers read the whole list once before
//! discovery. Lines are `host:port`; a bare `port` means a seed on
//! 127.0.0.1.
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{Result, RumorError};
use crate::node::NodeAddress;
use crate::settings::DEFAULT_HOST;

pub struct SeedList {
    path: PathBuf,
}

impl SeedList {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every seed, skipping blank lines and duplicates. A missing file is an empty list.
    pub async fn read(&self) -> Result<Vec<NodeAddress>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Seed config {} does not exist", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(RumorError::Io(e)),
        };

        let mut seeds: Vec<NodeAddress> = Vec::new();
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let seed = NodeAddress::parse_with_default_host(line, DEFAULT_HOST).map_err(|e| {
                RumorError::Config(format!(
                    "{}: bad seed entry {:?}: {}",
                    self.path.display(),
                    line,
                    e
                ))
            })?;
            if !seeds.contains(&seed) {
                seeds.push(seed);
            }
        }
        Ok(seeds)
    }

    pub async fn append(&self, seed: &NodeAddress) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", seed).as_bytes()).await?;
        file.flush().await?;
        info!("Registered seed {} in {}", seed, self.path.display());
        Ok(())
    }
}
