//! Optimistic mutation of a densely ordered collection.
//!
//! Every mutating call applies its local effect before returning and hands
//! back the remote half as a [`Pending`] future. Callers may await it, spawn
//! it, or hold it while they inspect the local state.

use std::collections::{HashMap, HashSet};
use std::future::{self, Future};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flashdeck_core::import::provisional_order;
use flashdeck_core::model::{OrderedRecord, ProvisionalKind, RecordKey};
use flashdeck_core::ordering::{self, ReorderOutcome};
use storage::repository::{RecordRepository, StorageError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::coalescer::WriteCoalescer;
use crate::config::{ReorderFailurePolicy, SyncConfig};
use crate::error::{SyncAction, SyncError};
use crate::status::StatusBoard;

/// Remote half of a mutation whose local half has already been applied.
pub type Pending<R> = Pin<Box<dyn Future<Output = Result<R, SyncError>> + Send + 'static>>;

fn settled<R: Send + 'static>(result: Result<R, SyncError>) -> Pending<R> {
    Box::pin(future::ready(result))
}

struct State<T: OrderedRecord> {
    records: Vec<T>,
    next_provisional: u64,
    // Ids with a remote call in flight. Observational only.
    pending: HashSet<T::Id>,
    // Debounced writes that came due before their record was confirmed.
    held: HashMap<T::Id, T::Patch>,
    // Placeholder id to server id, for writes that race a confirmation.
    renamed: HashMap<T::Id, T::Id>,
}

struct Shared<T: OrderedRecord> {
    scope: T::Scope,
    repo: Arc<dyn RecordRepository<T>>,
    config: SyncConfig,
    state: Mutex<State<T>>,
    status: StatusBoard,
}

impl<T: OrderedRecord> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail<R>(&self, error: SyncError) -> Result<R, SyncError> {
        self.status.report(error.clone());
        Err(error)
    }

    fn contains(&self, id: &T::Id) -> bool {
        self.lock().records.iter().any(|r| r.id() == id)
    }

    fn settle(&self, id: &T::Id) {
        self.lock().pending.remove(id);
    }

    /// Sends `patch` for `id` and swaps in the stored representation.
    ///
    /// Returns `Ok(None)` when the record is gone locally or remotely; that is
    /// not reported. A write for an unconfirmed record is held and sent once the store
    /// confirms it.
    async fn write(self: Arc<Self>, id: T::Id, patch: T::Patch) -> Result<Option<T>, SyncError> {
        let id = {
            let mut state = self.lock();
            let id = state.renamed.get(&id).cloned().unwrap_or(id);
            if !state.records.iter().any(|r| r.id() == &id) {
                debug!(kind = T::KIND, %id, "record gone before write; skipped");
                return Ok(None);
            }
            if id.is_provisional() {
                debug!(kind = T::KIND, %id, "record unconfirmed; holding write");
                state.held.insert(id, patch);
                return Ok(None);
            }
            state.pending.insert(id.clone());
            id
        };

        let result = self.repo.update(&id, &patch).await;
        self.settle(&id);
        match result {
            Ok(mut saved) => {
                let mut state = self.lock();
                if let Some(slot) = state.records.iter_mut().find(|r| r.id() == &id) {
                    // Position is owned locally; reorders persist it separately.
                    saved.set_order(slot.order());
                    *slot = saved.clone();
                }
                Ok(Some(saved))
            }
            Err(StorageError::NotFound) => {
                debug!(kind = T::KIND, %id, "record deleted remotely before write");
                Ok(None)
            }
            Err(source) => self.fail(SyncError::remote(SyncAction::Update, T::KIND, source)),
        }
    }

    /// Swaps the stored record into the placeholder's slot.
    ///
    /// The slot keeps its current order, which a reorder or delete during the
    /// round trip may have changed. Returns the sequence to persist when that
    /// order differs from the stored one, plus any write held for the
    /// placeholder.
    fn confirm(&self, temp_id: &T::Id, saved: &mut T) -> (Option<Vec<T>>, Option<T::Patch>) {
        let mut state = self.lock();
        state.pending.remove(temp_id);
        let held = state.held.remove(temp_id);
        let Some(index) = state.records.iter().position(|r| r.id() == temp_id) else {
            debug!(kind = T::KIND, id = %temp_id, "provisional record gone before confirmation");
            return (None, None);
        };
        let stored_order = saved.order();
        saved.set_order(state.records[index].order());
        state.records[index] = saved.clone();
        state.renamed.insert(temp_id.clone(), saved.id().clone());
        let resequence = (saved.order() != stored_order).then(|| state.records.clone());
        (resequence, held)
    }

    /// Drops a placeholder the store refused.
    fn discard(&self, temp_id: &T::Id) {
        let mut state = self.lock();
        state.pending.remove(temp_id);
        state.held.remove(temp_id);
        state.records.retain(|r| r.id() != temp_id);
    }

    /// Stores the order of every confirmed record in `records`.
    async fn persist(&self, records: Vec<T>) -> Result<(), SyncError> {
        let confirmed: Vec<T> = records
            .into_iter()
            .filter(|r| !r.id().is_provisional())
            .collect();
        if confirmed.is_empty() {
            return Ok(());
        }
        self.repo
            .persist_order(&confirmed)
            .await
            .map_err(|source| SyncError::remote(SyncAction::PersistOrder, T::KIND, source))
    }

    /// Renumbers `S` to `1..=N` and persists it if any order moved.
    async fn close_gaps(&self) {
        let sequence = {
            let mut state = self.lock();
            ordering::renumber(&mut state.records).then(|| state.records.clone())
        };
        if let Some(sequence) = sequence {
            debug!(kind = T::KIND, count = sequence.len(), "closing order gaps");
            if let Err(error) = self.persist(sequence).await {
                self.status.report(error);
            }
        }
    }
}

/// The in-memory sequence `S` of one scope plus its remote collaborator.
#[derive(Clone)]
pub struct OrderedCollection<T: OrderedRecord> {
    shared: Arc<Shared<T>>,
    edits: WriteCoalescer<T::Id>,
}

impl<T: OrderedRecord> OrderedCollection<T> {
    #[must_use]
    pub fn new(scope: T::Scope, repo: Arc<dyn RecordRepository<T>>, config: SyncConfig) -> Self {
        let edits = WriteCoalescer::new(config.debounce);
        Self {
            shared: Arc::new(Shared {
                scope,
                repo,
                config,
                state: Mutex::new(State {
                    records: Vec::new(),
                    next_provisional: 0,
                    pending: HashSet::new(),
                    held: HashMap::new(),
                    renamed: HashMap::new(),
                }),
                status: StatusBoard::new(),
            }),
            edits,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &T::Scope {
        &self.shared.scope
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Copy of `S` in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.shared.lock().records.clone()
    }

    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.shared
            .lock()
            .records
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a remote call for `id` is outstanding.
    #[must_use]
    pub fn is_pending(&self, id: &T::Id) -> bool {
        self.shared.lock().pending.contains(id)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SyncError> {
        self.shared.status.current()
    }

    #[must_use]
    pub fn report_count(&self) -> u64 {
        self.shared.status.report_count()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncError>> {
        self.shared.status.subscribe()
    }

    pub(crate) fn check_writable(&self) -> Result<(), SyncError> {
        if self.shared.config.read_only {
            return self.shared.fail(SyncError::ReadOnly);
        }
        Ok(())
    }

    /// Replace `S` with the remote state, sorted by order, and clear the
    /// current error.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Remote` if the fetch fails; `S` is left untouched.
    pub async fn refresh(&self) -> Result<Vec<T>, SyncError> {
        match self.shared.repo.fetch(&self.shared.scope).await {
            Ok(mut records) => {
                ordering::sort_by_order(&mut records);
                self.shared.lock().records.clone_from(&records);
                self.shared.status.clear();
                debug!(kind = T::KIND, count = records.len(), "refreshed collection");
                Ok(records)
            }
            Err(source) => self
                .shared
                .fail(SyncError::remote(SyncAction::Fetch, T::KIND, source)),
        }
    }

    /// Append a provisional record with order `len + 1`, then create it remotely.
    ///
    /// On success the provisional entry is replaced in place by the stored
    /// record. On failure it is removed and the error reported.
    pub fn add(&self, draft: T::Draft) -> Pending<T> {
        self.insert_provisional(ProvisionalKind::Temp, draft, None)
    }

    pub(crate) fn insert_provisional(
        &self,
        kind: ProvisionalKind,
        draft: T::Draft,
        order: Option<u32>,
    ) -> Pending<T> {
        if let Err(error) = self.check_writable() {
            return settled(Err(error));
        }
        if let Err(invalid) = T::validate_draft(&draft, &self.shared.config.limits) {
            return settled(self.shared.fail(invalid.into()));
        }

        let provisional = {
            let mut state = self.shared.lock();
            state.next_provisional += 1;
            let id = T::Id::provisional(kind, state.next_provisional);
            let order = order.unwrap_or_else(|| provisional_order(state.records.len(), 0));
            let record = T::provisional(id.clone(), order, &draft, &self.shared.scope);
            state.records.push(record.clone());
            state.pending.insert(id);
            record
        };
        debug!(
            kind = T::KIND,
            id = %provisional.id(),
            order = provisional.order(),
            "appended provisional record"
        );

        let shared = Arc::clone(&self.shared);
        let edits = self.edits.clone();
        Box::pin(async move {
            let temp_id = provisional.id().clone();
            let result = shared
                .repo
                .create(&shared.scope, &draft, provisional.order())
                .await;
            let mut saved = match result {
                Ok(saved) => saved,
                Err(source) => {
                    edits.cancel(&temp_id);
                    shared.discard(&temp_id);
                    return shared.fail(SyncError::remote(SyncAction::Create, T::KIND, source));
                }
            };

            let (resequence, held) = shared.confirm(&temp_id, &mut saved);
            edits.rekey(&temp_id, saved.id().clone());
            if let Some(sequence) = resequence {
                debug!(
                    kind = T::KIND,
                    id = %saved.id(),
                    order = saved.order(),
                    "record moved while unconfirmed; persisting order"
                );
                if let Err(error) = shared.persist(sequence).await {
                    shared.status.report(error);
                }
            }
            if let Some(patch) = held {
                // Failures are already on the status board.
                if let Ok(Some(updated)) = Arc::clone(&shared).write(saved.id().clone(), patch).await
                {
                    saved = updated;
                }
            }
            Ok(saved)
        })
    }

    /// Queue an edit of `id`. Edits arriving within the debounce window
    /// collapse into one remote write carrying the last values.
    ///
    /// `S` is not touched until that write resolves. An edit of a record
    /// that is still being created is sent after the store confirms it.
    /// Outside a Tokio runtime the edit stays queued until
    /// [`flush_edits`](Self::flush_edits).
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if `id` is not in `S`,
    /// `SyncError::Validation` if the patch is invalid (any queued write for
    /// `id` is dropped), or `SyncError::ReadOnly`.
    pub fn update(&self, id: &T::Id, patch: T::Patch) -> Result<(), SyncError> {
        self.check_writable()?;
        if !self.shared.contains(id) {
            return self.shared.fail(SyncError::not_found(T::KIND, id));
        }
        if let Err(invalid) = T::validate_patch(&patch, &self.shared.config.limits) {
            self.edits.cancel(id);
            return self.shared.fail(invalid.into());
        }

        let shared = Arc::clone(&self.shared);
        self.edits.schedule(id.clone(), move |key| async move {
            // Failures are already on the status board.
            let _ = shared.write(key, patch).await;
        });
        Ok(())
    }

    /// Write an edit immediately, superseding any queued edit for `id`.
    ///
    /// A record still being created resolves to `SyncError::Unconfirmed`.
    pub fn save(&self, id: &T::Id, patch: T::Patch) -> Pending<T> {
        if let Err(error) = self.check_writable() {
            return settled(Err(error));
        }
        if !self.shared.contains(id) {
            return settled(self.shared.fail(SyncError::not_found(T::KIND, id)));
        }
        if id.is_provisional() {
            return settled(self.shared.fail(SyncError::unconfirmed(T::KIND, id)));
        }
        if let Err(invalid) = T::validate_patch(&patch, &self.shared.config.limits) {
            return settled(self.shared.fail(invalid.into()));
        }
        self.edits.cancel(id);

        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        Box::pin(async move {
            match Arc::clone(&shared).write(id.clone(), patch).await? {
                Some(saved) => Ok(saved),
                None => shared.fail(SyncError::not_found(T::KIND, &id)),
            }
        })
    }

    /// Run every queued edit now.
    pub async fn flush_edits(&self) {
        self.edits.flush().await;
    }

    #[must_use]
    pub fn has_queued_edit(&self, id: &T::Id) -> bool {
        self.edits.is_queued(id)
    }

    /// Remove `id` from `S` at once, then delete it remotely.
    ///
    /// A remote failure restores `S` exactly as it was before this call. A
    /// success closes the gap left in the order.
    pub fn delete(&self, id: &T::Id) -> Pending<()> {
        if let Err(error) = self.check_writable() {
            return settled(Err(error));
        }
        let snapshot = {
            let mut state = self.shared.lock();
            let Some(position) = state.records.iter().position(|r| r.id() == id) else {
                return settled(self.shared.fail(SyncError::not_found(T::KIND, id)));
            };
            let snapshot = state.records.clone();
            state.records.remove(position);
            state.pending.insert(id.clone());
            snapshot
        };
        debug!(kind = T::KIND, %id, "removed record locally");

        let shared = Arc::clone(&self.shared);
        let id = id.clone();
        Box::pin(async move {
            let result = shared.repo.delete(&id).await;
            shared.settle(&id);
            match result {
                Ok(()) => {
                    shared.close_gaps().await;
                    Ok(())
                }
                Err(source) => {
                    warn!(kind = T::KIND, %id, "delete failed; restoring previous records");
                    shared.lock().records = snapshot;
                    shared.fail(SyncError::remote(SyncAction::Delete, T::KIND, source))
                }
            }
        })
    }

    /// Move the record at `source` to `destination` and persist the new order.
    ///
    /// `destination` is `None` for a drop outside any target. Resolves to
    /// `false` when nothing moved. What a failed write does to `S` follows
    /// [`SyncConfig::reorder_failure`].
    pub fn reorder(&self, source: usize, destination: Option<usize>) -> Pending<bool> {
        if let Err(error) = self.check_writable() {
            return settled(Err(error));
        }
        let (before, after) = {
            let mut state = self.shared.lock();
            match ordering::relocate(&state.records, source, destination) {
                ReorderOutcome::Unchanged => return settled(Ok(false)),
                ReorderOutcome::Moved(sequence) => {
                    let before = std::mem::replace(&mut state.records, sequence.clone());
                    (before, sequence)
                }
            }
        };
        debug!(kind = T::KIND, source, ?destination, "reordered locally");

        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            match shared.persist(after).await {
                Ok(()) => Ok(true),
                Err(error) => {
                    if shared.config.reorder_failure == ReorderFailurePolicy::Rollback {
                        warn!(kind = T::KIND, "reorder failed; restoring previous order");
                        shared.lock().records = before;
                    }
                    shared.fail(error)
                }
            }
        })
    }

    /// Close any gap in `S` left by failed submissions and persist the result.
    pub(crate) async fn close_gaps(&self) {
        self.shared.close_gaps().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdeck_core::model::{CardDraft, CardId, CardScope, DeckId, Flashcard, UserId};
    use storage::repository::Storage;

    fn collection(config: SyncConfig) -> OrderedCollection<Flashcard> {
        OrderedCollection::new(
            CardScope::new(DeckId::new("d1"), UserId::new("u1")),
            Storage::in_memory().cards,
            config,
        )
    }

    #[tokio::test]
    async fn provisional_ids_never_repeat() {
        let cards = collection(SyncConfig::default());
        let first = cards.add(CardDraft::placeholder());
        let second = cards.add(CardDraft::placeholder());

        let ids: Vec<CardId> = cards.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, [CardId::new("temp-1"), CardId::new("temp-2")]);
        assert!(ids.iter().all(|id| cards.is_pending(id)));

        first.await.unwrap();
        second.await.unwrap();
        assert!(cards.snapshot().iter().all(|c| !c.id.is_provisional()));
    }

    #[tokio::test]
    async fn read_only_rejects_before_touching_records() {
        let cards = collection(SyncConfig::default().read_only(true));

        let err = cards.add(CardDraft::placeholder()).await.unwrap_err();
        assert_eq!(err, SyncError::ReadOnly);
        assert!(cards.is_empty());
        assert_eq!(cards.reorder(0, Some(1)).await, Err(SyncError::ReadOnly));
        assert_eq!(cards.last_error(), Some(SyncError::ReadOnly));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_locally() {
        let cards = collection(SyncConfig::default());
        let err = cards.add(CardDraft::new("", "answer")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(cards.is_empty());
        assert_eq!(cards.report_count(), 1);
    }
}
