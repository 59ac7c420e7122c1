//! Target file publisher
//!
//! Serializes target groups as the scraper's static-discovery document
//! and replaces the file atomically so readers never see a torn write.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::metrics;
use crate::types::TargetGroup;

/// Publication of a target list.
#[async_trait]
pub trait WriteTargets: Send + Sync {
    /// Replace the published list with `targets`. An empty slice is
    /// published as `[]`.
    async fn write(&self, targets: &[TargetGroup]) -> Result<(), PublishError>;
}

/// Publisher writing JSON to a configured path, mode 0644.
pub struct FileTargetWriter {
    path: PathBuf,
}

impl FileTargetWriter {
    /// Create a publisher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn replace(&self, targets: &[TargetGroup]) -> Result<(), PublishError> {
        let encoded = serde_json::to_vec(targets)?;

        let temp_path = self.path.with_file_name(format!(
            "{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "targets".to_string())
        ));

        tokio::fs::write(&temp_path, &encoded).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WriteTargets for FileTargetWriter {
    async fn write(&self, targets: &[TargetGroup]) -> Result<(), PublishError> {
        metrics::DISCOVERER_WRITE_TARGETS_TOTAL.inc();

        let result = self.replace(targets).await;
        if let Err(ref e) = result {
            metrics::DISCOVERER_WRITE_TARGETS_ERRORS_TOTAL.inc();
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to write targets"
            );
        }

        result
    }
}
