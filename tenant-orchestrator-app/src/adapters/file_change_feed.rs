//! Change-feed sink writing one file per record.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use tenant_orchestrator_core::error::{CoreError, CoreResult};
use tenant_orchestrator_core::traits::ChangeFeedSink;

/// Writes each change-feed record to `<root>/<key>`.
///
/// Records are written to a temporary file first and renamed into place, so a
/// reader never sees a partial record.
pub struct FileChangeFeedSink {
    root: PathBuf,
}

impl FileChangeFeedSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> CoreResult<PathBuf> {
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(CoreError::StorageError(format!(
                "Invalid change feed key: {key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ChangeFeedSink for FileChangeFeedSink {
    async fn put(&self, key: &str, body: &[u8]) -> CoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::StorageError(format!("Failed to create directory: {e}")))?;
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to write {key}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to write {key}: {e}")))?;
        Ok(())
    }
}
