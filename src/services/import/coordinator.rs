use crate::services::content_store::{ArticleRecord, ContentStore};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::markdown::parse_document;
use super::types::{DocumentCandidate, ImportContext, ImportFailure, ImportOutcome};

enum DocumentResult {
    Imported(String),
    Failed(ImportFailure),
}

/// Turns candidates into persisted records. Every document is handled on its
/// own: a parse or persistence failure is recorded and the batch goes on.
pub struct ImportCoordinator {
    store: Arc<dyn ContentStore>,
    concurrency: usize,
}

impl ImportCoordinator {
    pub fn new(store: Arc<dyn ContentStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Persists every candidate under `context`. No deduplication happens:
    /// importing the same files twice creates two sets of records.
    /// Documents not yet started when `cancel` fires are reported as failures.
    pub async fn import_all(
        &self,
        candidates: Vec<DocumentCandidate>,
        context: &ImportContext,
        cancel: &CancellationToken,
    ) -> ImportOutcome {
        let attempted = candidates.len();

        let results: Vec<DocumentResult> = futures::stream::iter(candidates)
            .map(|candidate| self.import_one(candidate, context, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = ImportOutcome {
            attempted,
            ..Default::default()
        };
        for result in results {
            match result {
                DocumentResult::Imported(id) => {
                    outcome.imported += 1;
                    outcome.article_ids.push(id);
                }
                DocumentResult::Failed(failure) => outcome.failures.push(failure),
            }
        }

        tracing::info!(
            "Imported [{}] markdowns, [{}] failed",
            outcome.imported,
            outcome.failures.len()
        );

        outcome
    }

    async fn import_one(
        &self,
        candidate: DocumentCandidate,
        context: &ImportContext,
        cancel: &CancellationToken,
    ) -> DocumentResult {
        if cancel.is_cancelled() {
            return DocumentResult::Failed(ImportFailure::new(candidate.name, "import cancelled"));
        }

        let parsed = match parse_document(&candidate) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Parse markdown [{}] failed: {}", candidate.path.display(), e);
                return DocumentResult::Failed(ImportFailure::new(candidate.name, e.to_string()));
            }
        };

        let record = ArticleRecord::new(parsed, context, &candidate.name);
        match self.store.persist(record).await {
            Ok(id) => {
                tracing::debug!("Imported markdown [{}] as article {}", candidate.name, id);
                DocumentResult::Imported(id)
            }
            Err(e) => {
                tracing::warn!("Persist markdown [{}] failed: {:#}", candidate.path.display(), e);
                DocumentResult::Failed(ImportFailure::new(candidate.name, "failed to save article"))
            }
        }
    }
}
