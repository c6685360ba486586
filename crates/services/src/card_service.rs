use std::sync::Arc;

use flashdeck_core::import::ImportCandidate;
use flashdeck_core::model::{CardDraft, CardId, CardPatch, CardScope, DeckId, Flashcard, UserId};
use storage::repository::RecordRepository;
use tokio::sync::watch;

use crate::collection::{OrderedCollection, Pending};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::import::ImportReport;

/// The flashcards of one deck.
#[derive(Clone)]
pub struct CardService {
    cards: OrderedCollection<Flashcard>,
}

impl CardService {
    #[must_use]
    pub fn new(
        deck_id: DeckId,
        user_id: UserId,
        cards: Arc<dyn RecordRepository<Flashcard>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            cards: OrderedCollection::new(CardScope::new(deck_id, user_id), cards, config),
        }
    }

    #[must_use]
    pub fn deck_id(&self) -> &DeckId {
        &self.cards.scope().deck_id
    }

    #[must_use]
    pub fn collection(&self) -> &OrderedCollection<Flashcard> {
        &self.cards
    }

    /// Load the deck's cards from storage.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Remote` if the fetch fails.
    pub async fn load(&self) -> Result<Vec<Flashcard>, SyncError> {
        self.cards.refresh().await
    }

    #[must_use]
    pub fn cards(&self) -> Vec<Flashcard> {
        self.cards.snapshot()
    }

    pub fn add_card(
        &self,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Pending<Flashcard> {
        self.cards.add(CardDraft::new(question, answer))
    }

    /// Add a "Term" / "Definition" card for the user to fill in.
    pub fn add_blank_card(&self) -> Pending<Flashcard> {
        self.cards.add(CardDraft::placeholder())
    }

    /// Queue an edit; it is written once typing pauses.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the card is unknown, the text is invalid, or the
    /// deck is read-only.
    pub fn edit_card(
        &self,
        id: &CardId,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.cards.update(id, CardPatch::new(question, answer))
    }

    pub async fn flush_edits(&self) {
        self.cards.flush_edits().await;
    }

    pub fn delete_card(&self, id: &CardId) -> Pending<()> {
        self.cards.delete(id)
    }

    pub fn move_card(&self, from: usize, to: Option<usize>) -> Pending<bool> {
        self.cards.reorder(from, to)
    }

    /// # Errors
    ///
    /// Returns `SyncError::ReadOnly` if the deck is read-only.
    pub async fn import_cards(
        &self,
        candidates: Vec<ImportCandidate>,
    ) -> Result<ImportReport, SyncError> {
        self.cards.import(candidates).await
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SyncError> {
        self.cards.last_error()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncError>> {
        self.cards.subscribe()
    }
}
