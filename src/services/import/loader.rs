use std::path::Path;

use super::error::{ImportError, WorkspaceStage};
use super::types::{DocumentCandidate, ImportFailure};

/// Candidates read from an extraction directory, plus the files that could
/// not be read.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub candidates: Vec<DocumentCandidate>,
    pub skipped: Vec<ImportFailure>,
}

/// Reads the top-level regular files of an extraction directory as text.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Lists `dir` (non-recursive) and reads every regular file into memory.
    /// Only a failure to list the directory is fatal; unreadable or non-UTF-8
    /// files are skipped and reported.
    pub async fn load(&self, dir: &Path) -> Result<LoadReport, ImportError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ImportError::workspace(WorkspaceStage::ReadExtractionDir, dir, e))?;

        let mut report = LoadReport::default();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(ImportError::workspace(
                        WorkspaceStage::ReadExtractionDir,
                        dir,
                        e,
                    ));
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => {
                    tracing::debug!("Skipping non-regular entry [{}]", path.display());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Stat file [{}] failed: {}", path.display(), e);
                    report.skipped.push(ImportFailure::new(name, "file cannot be read"));
                    continue;
                }
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Read file [{}] failed: {}", path.display(), e);
                    report.skipped.push(ImportFailure::new(name, "file cannot be read"));
                    continue;
                }
            };

            let content = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Decode file [{}] failed: {}", path.display(), e);
                    report
                        .skipped
                        .push(ImportFailure::new(name, "file is not valid UTF-8 text"));
                    continue;
                }
            };

            let content = match content.strip_prefix('\u{feff}') {
                Some(rest) => rest.to_string(),
                None => content,
            };

            report.candidates.push(DocumentCandidate {
                name,
                path,
                content,
            });
        }

        tracing::debug!(
            "Loaded {} candidates from [{}], {} skipped",
            report.candidates.len(),
            dir.display(),
            report.skipped.len()
        );

        Ok(report)
    }
}
