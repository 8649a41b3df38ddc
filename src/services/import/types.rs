use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncRead;
use utoipa::ToSchema;

/// Upload stream plus the filename the client declared for it.
/// Consumed by the extractor while the container is written.
pub struct UploadHandle<R> {
    pub filename: String,
    pub reader: R,
}

impl<R: AsyncRead + Unpin + Send> UploadHandle<R> {
    pub fn new(filename: impl Into<String>, reader: R) -> Self {
        Self {
            filename: filename.into(),
            reader,
        }
    }
}

/// Where imported records belong. Always supplied by the caller's session,
/// never read from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    pub owner_id: String,
    pub bucket_id: String,
}

/// A file read from the top level of the extraction directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCandidate {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportFailure {
    pub name: String,
    pub reason: String,
}

impl ImportFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Aggregate result of a completed import.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportOutcome {
    /// Candidates handed to the coordinator
    pub attempted: usize,
    /// Records persisted
    pub imported: usize,
    pub article_ids: Vec<String>,
    /// Files skipped while loading plus documents that failed to parse or persist
    pub failures: Vec<ImportFailure>,
}

impl ImportOutcome {
}

/// Per-request progress through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Received,
    Extracting,
    Loading,
    Persisting,
    Completed,
    Failed,
}

impl ImportStage {
    /// `Persisting` never fails the request; it always reaches `Completed`.
    pub fn can_transition_to(self, next: ImportStage) -> bool {
        use ImportStage::*;
        matches!(
            (self, next),
            (Received, Extracting)
                | (Extracting, Loading)
                | (Loading, Persisting)
                | (Persisting, Completed)
                | (Received, Failed)
                | (Extracting, Failed)
                | (Loading, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ImportStage::Completed | ImportStage::Failed)
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImportStage::Received => "received",
            ImportStage::Extracting => "extracting",
            ImportStage::Loading => "loading",
            ImportStage::Persisting => "persisting",
            ImportStage::Completed => "completed",
            ImportStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
