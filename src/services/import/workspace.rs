use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::validate_owner_key;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::OwnedMutexGuard;

use super::error::{ImportError, WorkspaceStage};

/// Hands out per-owner archive workspaces under one scratch root.
#[derive(Debug, Clone)]
pub struct WorkspaceFactory {
    root: PathBuf,
    owners: KeyedMutex,
}

impl WorkspaceFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owners: KeyedMutex::new(),
        }
    }

    /// Acquires the workspace of `owner_key`, waiting for any import already
    /// running for the same owner to release it.
    pub async fn acquire(&self, owner_key: &str) -> Result<ArchiveWorkspace, ImportError> {
        let owner_key = validate_owner_key(owner_key)
            .map_err(|e| ImportError::InvalidOwnerKey(e.message))?;

        let guard = self.owners.lock(owner_key).await;
        tracing::debug!("🔒 Workspace lock acquired for owner {}", owner_key);

        Ok(ArchiveWorkspace {
            owner_key: owner_key.to_string(),
            container_path: self.root.join(format!("{}-import.zip", owner_key)),
            extraction_dir: self.root.join(format!("{}-import", owner_key)),
            released: false,
            _guard: guard,
        })
    }

    /// Drops lock entries of owners with no import in flight.
    pub fn cleanup_idle(&self) {
        self.owners.cleanup();
    }
}

/// Scratch area of one import: a container file and an extraction directory,
/// both namespaced by the owner key. Holding it excludes other imports by the
/// same owner. Its files are removed on `release` or, failing that, on drop.
#[derive(Debug)]
pub struct ArchiveWorkspace {
    owner_key: String,
    container_path: PathBuf,
    extraction_dir: PathBuf,
    released: bool,
    _guard: OwnedMutexGuard<()>,
}

impl ArchiveWorkspace {
    pub fn owner_key(&self) -> &str {
        &self.owner_key
    }

    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    pub fn extraction_dir(&self) -> &Path {
        &self.extraction_dir
    }

    /// Removes whatever a previous run left in the extraction directory and
    /// creates it empty. A missing directory is not an error.
    pub async fn reset_extraction_dir(&self) -> Result<(), ImportError> {
        match tokio::fs::remove_dir_all(&self.extraction_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ImportError::workspace(
                    WorkspaceStage::ClearExtractionDir,
                    &self.extraction_dir,
                    e,
                ));
            }
        }

        tokio::fs::create_dir(&self.extraction_dir)
            .await
            .map_err(|e| {
                ImportError::workspace(WorkspaceStage::CreateExtractionDir, &self.extraction_dir, e)
            })
    }

    /// Deletes the container and the extraction directory, then releases the
    /// owner lock. Failures are logged; the next run clears leftovers anyway.
    pub async fn release(mut self) {
        if let Err(e) = remove_file_if_exists(&self.container_path).await {
            tracing::warn!(
                "Failed to remove temp file [{}]: {}",
                self.container_path.display(),
                e
            );
        }
        if let Err(e) = remove_dir_if_exists(&self.extraction_dir).await {
            tracing::warn!(
                "Failed to remove temp dir [{}]: {}",
                self.extraction_dir.display(),
                e
            );
        }
        self.released = true;
        tracing::debug!("🔓 Workspace released for owner {}", self.owner_key);
    }
}

impl Drop for ArchiveWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Early-return and cancelled paths end up here
        if let Err(e) = std::fs::remove_file(&self.container_path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(
                "Failed to remove temp file [{}]: {}",
                self.container_path.display(),
                e
            );
        }
        if let Err(e) = std::fs::remove_dir_all(&self.extraction_dir)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(
                "Failed to remove temp dir [{}]: {}",
                self.extraction_dir.display(),
                e
            );
        }
    }
}

async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
