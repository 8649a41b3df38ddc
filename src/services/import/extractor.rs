use crate::config::ImportConfig;
use crate::utils::validation::archive_entry_path;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use zip::result::ZipError;

use super::error::{ImportError, WorkspaceStage};
use super::types::{ImportFailure, UploadHandle};
use super::workspace::ArchiveWorkspace;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Size and shape limits applied to an uploaded container.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_container_size: u64,
    pub max_entries: usize,
    pub max_extracted_size: u64,
    pub flatten_directories: bool,
}

impl From<&ImportConfig> for ArchiveLimits {
    fn from(config: &ImportConfig) -> Self {
        Self {
            max_container_size: config.max_upload_size as u64,
            max_entries: config.max_archive_entries,
            max_extracted_size: config.max_extracted_size,
            flatten_directories: config.flatten_directories,
        }
    }
}

/// An archive entry that passed validation, ready to be written.
#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
    size: u64,
}

/// What an unpack left in the extraction directory.
#[derive(Debug, Default)]
pub struct Extraction {
    pub dir: PathBuf,
    pub files: usize,
    /// Entries left out because an earlier entry took their path
    pub skipped: Vec<ImportFailure>,
}

/// Writes the uploaded container into a workspace and unpacks it.
#[derive(Debug, Clone)]
pub struct Extractor {
    limits: ArchiveLimits,
}

impl Extractor {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    /// Persists the upload, resets the extraction directory and unpacks the
    /// container into it.
    pub async fn materialize<R>(
        &self,
        workspace: &ArchiveWorkspace,
        upload: UploadHandle<R>,
    ) -> Result<Extraction, ImportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let written = self.write_container(workspace, upload).await?;
        tracing::debug!(
            "Container for owner {} written ({} bytes)",
            workspace.owner_key(),
            written
        );

        workspace.reset_extraction_dir().await?;

        let container = workspace.container_path().to_path_buf();
        let target = workspace.extraction_dir().to_path_buf();
        let limits = self.limits;
        let extraction =
            tokio::task::spawn_blocking(move || unpack(&container, &target, limits)).await??;

        tracing::info!(
            "📦 Unpacked {} files for owner {}, {} entries skipped",
            extraction.files,
            workspace.owner_key(),
            extraction.skipped.len()
        );
        Ok(extraction)
    }

    /// Copies the upload stream verbatim to the container file.
    /// The stream cannot be re-read, so any failure here is final.
    pub async fn write_container<R>(
        &self,
        workspace: &ArchiveWorkspace,
        upload: UploadHandle<R>,
    ) -> Result<u64, ImportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = workspace.container_path();
        tracing::trace!(
            "Writing upload [{}] to temp file [{}]",
            upload.filename,
            path.display()
        );

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| ImportError::workspace(WorkspaceStage::CreateContainer, path, e))?;

        // One byte past the limit tells an oversized upload apart from an exact fit
        let mut limited = upload.reader.take(self.limits.max_container_size + 1);
        let written = tokio::io::copy(&mut limited, &mut file)
            .await
            .map_err(|e| ImportError::workspace(WorkspaceStage::WriteContainer, path, e))?;
        file.flush()
            .await
            .map_err(|e| ImportError::workspace(WorkspaceStage::WriteContainer, path, e))?;

        if written > self.limits.max_container_size {
            return Err(ImportError::LimitExceeded(format!(
                "upload is larger than {} bytes",
                self.limits.max_container_size
            )));
        }

        Ok(written)
    }
}

/// Unpacks `container` into `target`. Every entry is validated before the
/// first one is written, so a rejected archive leaves `target` empty.
pub fn unpack(
    container: &Path,
    target: &Path,
    limits: ArchiveLimits,
) -> Result<Extraction, ImportError> {
    let file = File::open(container)
        .map_err(|e| ImportError::workspace(WorkspaceStage::OpenContainer, container, e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|source| corrupt(container, source))?;

    if archive.len() > limits.max_entries {
        return Err(ImportError::LimitExceeded(format!(
            "{} entries, at most {} allowed",
            archive.len(),
            limits.max_entries
        )));
    }

    let (plan, skipped) = plan_entries(&mut archive, container, limits)?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

    for entry in &plan {
        let destination = target.join(&entry.relative);

        if entry.is_dir {
            std::fs::create_dir_all(&destination)
                .map_err(|e| ImportError::workspace(WorkspaceStage::WriteEntry, &destination, e))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ImportError::workspace(WorkspaceStage::WriteEntry, parent, e))?;
        }

        let mut zipped = archive
            .by_index(entry.index)
            .map_err(|source| corrupt(container, source))?;
        let mut output = File::create(&destination)
            .map_err(|e| ImportError::workspace(WorkspaceStage::WriteEntry, &destination, e))?;

        // Read to EOF so the checksum is verified, but never past the declared size
        let mut copied: u64 = 0;
        loop {
            let read = match zipped.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(corrupt(container, ZipError::Io(e))),
            };
            copied += read as u64;
            if copied > entry.size {
                return Err(corrupt(
                    container,
                    ZipError::InvalidArchive("entry is larger than its declared size"),
                ));
            }
            output
                .write_all(&buffer[..read])
                .map_err(|e| ImportError::workspace(WorkspaceStage::WriteEntry, &destination, e))?;
        }
    }

    Ok(Extraction {
        dir: target.to_path_buf(),
        files: plan.iter().filter(|entry| !entry.is_dir).count(),
        skipped,
    })
}

fn corrupt(container: &Path, source: ZipError) -> ImportError {
    ImportError::Unpack {
        path: container.to_path_buf(),
        source,
    }
}

fn plan_entries<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    container: &Path,
    limits: ArchiveLimits,
) -> Result<(Vec<PlannedEntry>, Vec<ImportFailure>), ImportError> {
    let mut plan = Vec::with_capacity(archive.len());
    let mut skipped = Vec::new();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut total_size: u64 = 0;

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|source| corrupt(container, source))?;

        let name = entry.name().to_string();
        let relative = match archive_entry_path(&name) {
            Ok(Some(relative)) => relative,
            Ok(None) => {
                tracing::debug!("Skipping entry [{}] naming the archive root", name);
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    target: "audit",
                    "🚨 Path traversal entry [{}] rejected in [{}]: {}",
                    name,
                    container.display(),
                    e
                );
                return Err(ImportError::UnsafeEntry { entry: name });
            }
        };

        total_size = total_size.saturating_add(entry.size());
        if total_size > limits.max_extracted_size {
            return Err(ImportError::LimitExceeded(format!(
                "uncompressed size exceeds {} bytes",
                limits.max_extracted_size
            )));
        }

        let is_dir = entry.is_dir();
        let relative = if limits.flatten_directories {
            if is_dir {
                continue;
            }
            match relative.file_name() {
                Some(file_name) => PathBuf::from(file_name),
                None => continue,
            }
        } else {
            relative
        };

        if !is_dir && !claimed.insert(relative.clone()) {
            tracing::warn!(
                "Entry [{}] skipped, [{}] already taken by an earlier entry",
                name,
                relative.display()
            );
            skipped.push(ImportFailure::new(
                name,
                "another archive entry has the same file name",
            ));
            continue;
        }

        plan.push(PlannedEntry {
            index,
            relative,
            is_dir,
            size: entry.size(),
        });
    }

    Ok((plan, skipped))
}
