use crate::config::ImportConfig;
use crate::services::content_store::ContentStore;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

pub mod coordinator;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod markdown;
pub mod types;
pub mod workspace;

pub use coordinator::ImportCoordinator;
pub use error::{ImportError, WorkspaceStage};
pub use extractor::{ArchiveLimits, Extraction, Extractor};
pub use loader::DocumentLoader;
pub use types::{
    DocumentCandidate, ImportContext, ImportFailure, ImportOutcome, ImportStage, UploadHandle,
};
pub use workspace::{ArchiveWorkspace, WorkspaceFactory};

/// Runs one archive import: extract, load, persist.
pub struct ImportService {
    workspaces: WorkspaceFactory,
    extractor: Extractor,
    loader: DocumentLoader,
    coordinator: ImportCoordinator,
}

struct StageTracker<'a> {
    owner_key: &'a str,
    stage: ImportStage,
}

impl<'a> StageTracker<'a> {
    fn new(owner_key: &'a str) -> Self {
        tracing::debug!("Import for owner {} {}", owner_key, ImportStage::Received);
        Self {
            owner_key,
            stage: ImportStage::Received,
        }
    }

    fn advance(&mut self, next: ImportStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal import transition {} -> {}",
            self.stage,
            next
        );
        tracing::debug!(
            "Import for owner {}: {} -> {}",
            self.owner_key,
            self.stage,
            next
        );
        self.stage = next;
    }

    fn fail(&mut self, err: &ImportError) {
        match err {
            ImportError::UnsafeEntry { .. } => {}
            ImportError::Workspace { .. } | ImportError::Unpack { .. } | ImportError::Task(_) => {
                tracing::error!(
                    "❌ Import for owner {} failed while {}: {}",
                    self.owner_key,
                    self.stage,
                    err
                );
            }
            _ => tracing::warn!(
                "Import for owner {} failed while {}: {}",
                self.owner_key,
                self.stage,
                err
            ),
        }
        self.advance(ImportStage::Failed);
    }
}

impl ImportService {
    pub fn new(store: Arc<dyn ContentStore>, config: &ImportConfig) -> Self {
        Self {
            workspaces: WorkspaceFactory::new(&config.scratch_root),
            extractor: Extractor::new(ArchiveLimits::from(config)),
            loader: DocumentLoader::new(),
            coordinator: ImportCoordinator::new(store, config.persist_concurrency),
        }
    }

    /// Imports the archive in `upload` for `owner_key` into `context`.
    ///
    /// Imports by the same owner key run one at a time; a second call waits
    /// for the first to release the workspace. Container write, unpack and
    /// directory listing failures abort the import. Once persistence starts
    /// the import always completes, carrying per-document failures in the
    /// outcome.
    pub async fn import<R>(
        &self,
        owner_key: &str,
        context: ImportContext,
        upload: UploadHandle<R>,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome, ImportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut tracker = StageTracker::new(owner_key);

        let workspace = match self.workspaces.acquire(owner_key).await {
            Ok(workspace) => workspace,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            }
        };

        let result = self
            .run(&workspace, &mut tracker, context, upload, cancel)
            .await;
        if let Err(e) = &result {
            tracker.fail(e);
        }

        debug_assert!(
            tracker.stage.is_terminal(),
            "workspace released while {}",
            tracker.stage
        );
        workspace.release().await;
        self.workspaces.cleanup_idle();
        result
    }

    async fn run<R>(
        &self,
        workspace: &ArchiveWorkspace,
        tracker: &mut StageTracker<'_>,
        context: ImportContext,
        upload: UploadHandle<R>,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome, ImportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        tracker.advance(ImportStage::Extracting);
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        let extraction = self.extractor.materialize(workspace, upload).await?;

        tracing::info!(
            "Importing markdowns [zipFilePath={}, unzipPath={}]",
            workspace.container_path().display(),
            extraction.dir.display()
        );

        tracker.advance(ImportStage::Loading);
        let report = self.loader.load(&extraction.dir).await?;

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        tracker.advance(ImportStage::Persisting);
        let mut outcome = self
            .coordinator
            .import_all(report.candidates, &context, cancel)
            .await;

        // Unpack and loader skips come first: they never reached the coordinator
        let mut failures = extraction.skipped;
        failures.extend(report.skipped);
        failures.append(&mut outcome.failures);
        outcome.failures = failures;

        tracker.advance(ImportStage::Completed);
        Ok(outcome)
    }
}
