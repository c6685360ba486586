#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flashdeck_core::model::{CardScope, DeckId, Flashcard, OrderedRecord, UserId};
use services::{OrderedCollection, SyncConfig};
use storage::repository::{RecordRepository, Storage, StorageError};

/// Wraps a real repository and fails the calls a test asks it to.
pub struct ScriptedRepository<T: OrderedRecord> {
    inner: Arc<dyn RecordRepository<T>>,
    create_calls: AtomicUsize,
    failing_creates: Mutex<HashSet<usize>>,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_persist: AtomicBool,
    updates: Mutex<Vec<(T::Id, T::Patch)>>,
    persisted: Mutex<Vec<Vec<T::Id>>>,
}

pub fn scripted_failure() -> StorageError {
    StorageError::rejected("Failed", "scripted failure")
}

impl<T: OrderedRecord> ScriptedRepository<T> {
    pub fn new(inner: Arc<dyn RecordRepository<T>>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            create_calls: AtomicUsize::new(0),
            failing_creates: Mutex::new(HashSet::new()),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_persist: AtomicBool::new(false),
            updates: Mutex::new(Vec::new()),
            persisted: Mutex::new(Vec::new()),
        })
    }

    /// Fail the `n`th create call (1-based).
    pub fn fail_create_call(&self, n: usize) {
        self.failing_creates.lock().unwrap().insert(n);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<(T::Id, T::Patch)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> Vec<Vec<T::Id>> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn inner(&self) -> Arc<dyn RecordRepository<T>> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl<T: OrderedRecord> RecordRepository<T> for ScriptedRepository<T> {
    async fn fetch(&self, scope: &T::Scope) -> Result<Vec<T>, StorageError> {
        self.inner.fetch(scope).await
    }

    async fn create(&self, scope: &T::Scope, draft: &T::Draft, order: u32) -> Result<T, StorageError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_creates.lock().unwrap().contains(&call) {
            return Err(scripted_failure());
        }
        self.inner.create(scope, draft, order).await
    }

    async fn update(&self, id: &T::Id, patch: &T::Patch) -> Result<T, StorageError> {
        self.updates.lock().unwrap().push((id.clone(), patch.clone()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(scripted_failure());
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &T::Id) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(scripted_failure());
        }
        self.inner.delete(id).await
    }

    async fn persist_order(&self, records: &[T]) -> Result<(), StorageError> {
        self.persisted
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.id().clone()).collect());
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(scripted_failure());
        }
        self.inner.persist_order(records).await
    }
}

pub fn scope() -> CardScope {
    CardScope::new(DeckId::new("deck-1"), UserId::new("user-1"))
}

pub fn scripted_cards() -> Arc<ScriptedRepository<Flashcard>> {
    ScriptedRepository::new(Storage::in_memory().cards)
}

pub fn card_collection(
    repo: &Arc<ScriptedRepository<Flashcard>>,
    config: SyncConfig,
) -> OrderedCollection<Flashcard> {
    let repo: Arc<dyn RecordRepository<Flashcard>> = repo.clone();
    OrderedCollection::new(scope(), repo, config)
}

/// Adds cards with the given questions and waits for each to be confirmed.
pub async fn seed(cards: &OrderedCollection<Flashcard>, questions: &[&str]) {
    for q in questions {
        cards
            .add(flashdeck_core::model::CardDraft::new(*q, format!("{q} answer")))
            .await
            .expect("seed card");
    }
}

pub fn questions(cards: &OrderedCollection<Flashcard>) -> Vec<String> {
    cards.snapshot().into_iter().map(|c| c.question).collect()
}

pub fn orders(cards: &OrderedCollection<Flashcard>) -> Vec<u32> {
    cards.snapshot().into_iter().map(|c| c.order).collect()
}

/// `(question, order)` of every stored card, by order.
pub async fn stored(repo: &Arc<ScriptedRepository<Flashcard>>) -> Vec<(String, u32)> {
    let mut cards = repo.inner().fetch(&scope()).await.expect("fetch stored cards");
    cards.sort_by_key(|c| c.order);
    cards.into_iter().map(|c| (c.question, c.order)).collect()
}
