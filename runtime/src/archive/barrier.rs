//! Waits for in-flight downloads in the scratch directory to settle.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix Chromium gives a download while it is still being written.
pub const DEFAULT_PARTIAL_SUFFIX: &str = "crdownload";

/// Blocks until no partial-download marker remains in the scratch directory.
///
/// There is no timeout: a transfer that never finishes blocks forever.
#[derive(Debug, Clone)]
pub struct DownloadSyncBarrier {
    scratch_dir: PathBuf,
    poll_interval: Duration,
    partial_suffix: String,
}

impl DownloadSyncBarrier {
    pub fn new(scratch_dir: impl Into<PathBuf>, poll_interval: Duration, partial_suffix: &str) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            poll_interval,
            partial_suffix: partial_suffix.trim_start_matches('.').to_string(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Partial downloads currently present.
    pub fn in_flight(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.scratch_dir).with_context(|| {
            format!("failed to read scratch directory {}", self.scratch_dir.display())
        })?;
        let mut partial = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_marker = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext == self.partial_suffix);
            if is_marker {
                partial.push(path);
            }
        }
        Ok(partial)
    }

    /// Poll until [`in_flight`](Self::in_flight) is empty.
    pub async fn wait(&self) -> Result<()> {
        let mut polls: u64 = 0;
        loop {
            let partial = self.in_flight()?;
            if partial.is_empty() {
                if polls > 0 {
                    tracing::debug!("downloads settled after {polls} poll(s)");
                }
                return Ok(());
            }
            polls += 1;
            if polls == 1 || polls % 30 == 0 {
                tracing::info!("waiting for {} download(s) to finish", partial.len());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
