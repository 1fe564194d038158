use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::fs;
use tracing::{debug, warn};

/// A downloaded stream in local scratch storage.
///
/// The artifact owns its file: dropping it removes the file, so scratch space
/// is released on success and on every error path alike.
#[derive(Debug)]
pub struct FetchedArtifact {
    local_path: PathBuf,
    byte_size: u64,
    content_type: String,
}

impl FetchedArtifact {
    /// Takes ownership of a file that has been fully written.
    ///
    /// Zero-byte files are treated as corrupt downloads: the file is removed
    /// and an error is returned.
    pub async fn adopt(local_path: PathBuf, content_type: impl Into<String>) -> Result<Self> {
        let metadata = fs::metadata(&local_path)
            .await
            .with_context(|| format!("failed to read metadata for {}", local_path.display()))?;

        if metadata.len() == 0 {
            if let Err(err) = fs::remove_file(&local_path).await {
                warn!(
                    path = %local_path.display(),
                    "failed to remove empty download: {err:?}"
                );
            }
            bail!("downloaded file is empty: {}", local_path.display());
        }

        Ok(Self {
            byte_size: metadata.len(),
            local_path,
            content_type: content_type.into(),
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

impl Drop for FetchedArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.local_path) {
            Ok(()) => debug!(path = %self.local_path.display(), "removed scratch file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.local_path.display(),
                "failed to remove scratch file: {err:?}"
            ),
        }
    }
}
