//! Bulk import of externally parsed question/answer pairs.

use flashdeck_core::import::{ImportCandidate, provisional_order, screen_candidates};
use flashdeck_core::model::{Flashcard, ProvisionalKind};
use tracing::info;

use crate::collection::OrderedCollection;
use crate::error::SyncError;

/// Outcome of one import batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportReport {
    /// Cards confirmed by the remote store, in submission order.
    pub confirmed: Vec<Flashcard>,
    pub failures: Vec<ImportFailure>,
    /// Candidates screened out as blank or too long.
    pub dropped: usize,
}

impl ImportReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A screened candidate the remote store refused.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFailure {
    /// Position within the screened batch.
    pub position: usize,
    pub question: String,
    pub error: SyncError,
}

impl OrderedCollection<Flashcard> {
    /// Screen `candidates`, then submit the survivors one at a time through
    /// the add path.
    ///
    /// A failed submission is reported on its own and does not stop the
    /// rest of the batch. Afterwards any gap left by failures is closed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ReadOnly` before submitting anything if the
    /// collection is read-only. Per-item failures land in the report.
    pub async fn import(
        &self,
        candidates: Vec<ImportCandidate>,
    ) -> Result<ImportReport, SyncError> {
        self.check_writable()?;

        let batch = screen_candidates(candidates, &self.config().limits);
        let base = self.len();
        let mut report = ImportReport {
            dropped: batch.dropped,
            ..ImportReport::default()
        };

        for (position, draft) in batch.drafts.into_iter().enumerate() {
            let order = provisional_order(base, position);
            let question = draft.question.clone();
            match self
                .insert_provisional(ProvisionalKind::Imported, draft, Some(order))
                .await
            {
                Ok(card) => report.confirmed.push(card),
                Err(error) => report.failures.push(ImportFailure {
                    position,
                    question,
                    error,
                }),
            }
        }

        if !report.is_complete() {
            self.close_gaps().await;
        }

        info!(
            confirmed = report.confirmed.len(),
            failed = report.failures.len(),
            dropped = report.dropped,
            "import finished"
        );
        Ok(report)
    }
}
