use async_trait::async_trait;
use flashdeck_core::model::{
    CardId, CardScope, Deck, DeckDraft, DeckId, Flashcard, OrderedRecord, RecordKey, TagId, UserId,
};
use flashdeck_core::model::{CardDraft, CardPatch, DeckPatch};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
///
/// Every variant carries a short machine code and a human-readable detail;
/// callers surface both without parsing further.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("{code}: {detail}")]
    Rejected { code: String, detail: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    #[must_use]
    pub fn rejected(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Short category, e.g. `not_found` or the server's own error code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            StorageError::NotFound => "not_found",
            StorageError::Rejected { code, .. } => code,
            StorageError::Connection(_) => "connection",
            StorageError::Serialization(_) => "serialization",
        }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            StorageError::NotFound => "record does not exist",
            StorageError::Rejected { detail, .. } => detail,
            StorageError::Connection(msg) | StorageError::Serialization(msg) => msg,
        }
    }
}

/// Remote contract for one kind of ordered record.
///
/// Implementations map these operations onto whatever persistence API is
/// available; the collection engine only relies on the shapes below.
#[async_trait]
pub trait RecordRepository<T: OrderedRecord>: Send + Sync {
    /// Fetch every record in `scope`. Order of the returned list is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be loaded.
    async fn fetch(&self, scope: &T::Scope) -> Result<Vec<T>, StorageError>;

    /// Persist a new record and return it with its server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn create(&self, scope: &T::Scope, draft: &T::Draft, order: u32)
    -> Result<T, StorageError>;

    /// Apply changed fields and return the stored representation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update(&self, id: &T::Id, patch: &T::Patch) -> Result<T, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete(&self, id: &T::Id) -> Result<(), StorageError>;

    /// Store the `order` of every record in the given sequence.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any record is missing, or other storage errors.
    async fn persist_order(&self, records: &[T]) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Assigns `srv-<n>` ids and trims text the way the hosted store normalizes it.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    decks: Arc<Mutex<HashMap<DeckId, Deck>>>,
    cards: Arc<Mutex<HashMap<CardId, Flashcard>>>,
    next_id: Arc<AtomicU64>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_server_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("srv-{n}")
    }

    fn next_tag_id(&self) -> TagId {
        TagId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn normalize_tags(&self, draft: &DeckDraft) -> Vec<flashdeck_core::model::Tag> {
        draft
            .tags
            .iter()
            .cloned()
            .map(|mut tag| {
                if tag.id.value() == 0 {
                    tag.id = self.next_tag_id();
                }
                tag
            })
            .collect()
    }
}

#[async_trait]
impl RecordRepository<Flashcard> for InMemoryRepository {
    async fn fetch(&self, scope: &CardScope) -> Result<Vec<Flashcard>, StorageError> {
        let guard = self.cards.lock().map_err(poisoned)?;
        let mut cards: Vec<Flashcard> = guard
            .values()
            .filter(|card| card.deck_id == scope.deck_id && card.user_id == scope.user_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(cards)
    }

    async fn create(
        &self,
        scope: &CardScope,
        draft: &CardDraft,
        order: u32,
    ) -> Result<Flashcard, StorageError> {
        let card = Flashcard {
            id: CardId::from_server(self.next_server_id()),
            deck_id: scope.deck_id.clone(),
            user_id: scope.user_id.clone(),
            question: draft.question.trim().to_owned(),
            answer: draft.answer.trim().to_owned(),
            order,
        };
        let mut guard = self.cards.lock().map_err(poisoned)?;
        guard.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    async fn update(&self, id: &CardId, patch: &CardPatch) -> Result<Flashcard, StorageError> {
        let mut guard = self.cards.lock().map_err(poisoned)?;
        let card = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        card.question = patch.question.trim().to_owned();
        card.answer = patch.answer.trim().to_owned();
        Ok(card.clone())
    }

    async fn delete(&self, id: &CardId) -> Result<(), StorageError> {
        let mut guard = self.cards.lock().map_err(poisoned)?;
        guard.remove(id).map(|_| ()).ok_or(StorageError::NotFound)
    }

    async fn persist_order(&self, records: &[Flashcard]) -> Result<(), StorageError> {
        let mut guard = self.cards.lock().map_err(poisoned)?;
        if records.iter().any(|card| !guard.contains_key(&card.id)) {
            return Err(StorageError::NotFound);
        }
        for card in records {
            if let Some(stored) = guard.get_mut(&card.id) {
                stored.order = card.order;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordRepository<Deck> for InMemoryRepository {
    async fn fetch(&self, scope: &UserId) -> Result<Vec<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        let mut decks: Vec<Deck> = guard
            .values()
            .filter(|deck| &deck.user_id == scope)
            .cloned()
            .collect();
        decks.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(decks)
    }

    async fn create(
        &self,
        scope: &UserId,
        draft: &DeckDraft,
        order: u32,
    ) -> Result<Deck, StorageError> {
        let deck = Deck {
            id: DeckId::from_server(self.next_server_id()),
            user_id: scope.clone(),
            name: draft.name.trim().to_owned(),
            description: draft.description.trim().to_owned(),
            tags: self.normalize_tags(draft),
            order,
            is_public: draft.is_public,
        };
        let mut guard = self.decks.lock().map_err(poisoned)?;
        guard.insert(deck.id.clone(), deck.clone());
        Ok(deck)
    }

    async fn update(&self, id: &DeckId, patch: &DeckPatch) -> Result<Deck, StorageError> {
        let tags = self.normalize_tags(patch);
        let mut guard = self.decks.lock().map_err(poisoned)?;
        let deck = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        deck.name = patch.name.trim().to_owned();
        deck.description = patch.description.trim().to_owned();
        deck.tags = tags;
        deck.is_public = patch.is_public;
        Ok(deck.clone())
    }

    async fn delete(&self, id: &DeckId) -> Result<(), StorageError> {
        {
            let mut guard = self.decks.lock().map_err(poisoned)?;
            guard.remove(id).ok_or(StorageError::NotFound)?;
        }
        let mut cards = self.cards.lock().map_err(poisoned)?;
        cards.retain(|_, card| &card.deck_id != id);
        Ok(())
    }

    async fn persist_order(&self, records: &[Deck]) -> Result<(), StorageError> {
        let mut guard = self.decks.lock().map_err(poisoned)?;
        if records.iter().any(|deck| !guard.contains_key(deck.id())) {
            return Err(StorageError::NotFound);
        }
        for deck in records {
            if let Some(stored) = guard.get_mut(deck.id()) {
                stored.order = deck.order;
            }
        }
        Ok(())
    }
}

/// Aggregates card and deck repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn RecordRepository<Deck>>,
    pub cards: Arc<dyn RecordRepository<Flashcard>>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let decks: Arc<dyn RecordRepository<Deck>> = Arc::new(repo.clone());
        let cards: Arc<dyn RecordRepository<Flashcard>> = Arc::new(repo);
        Self { decks, cards }
    }
}
