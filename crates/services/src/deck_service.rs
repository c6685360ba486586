use std::collections::BTreeSet;
use std::sync::Arc;

use flashdeck_core::model::{Deck, DeckDraft, DeckId, DeckPatch, UserId};
use storage::repository::RecordRepository;

use crate::collection::{OrderedCollection, Pending};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// The decks of one user.
#[derive(Clone)]
pub struct DeckService {
    decks: OrderedCollection<Deck>,
}

impl DeckService {
    #[must_use]
    pub fn new(user_id: UserId, decks: Arc<dyn RecordRepository<Deck>>, config: SyncConfig) -> Self {
        Self {
            decks: OrderedCollection::new(user_id, decks, config),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        self.decks.scope()
    }

    #[must_use]
    pub fn collection(&self) -> &OrderedCollection<Deck> {
        &self.decks
    }

    /// # Errors
    ///
    /// Returns `SyncError::Remote` if the fetch fails.
    pub async fn load(&self) -> Result<Vec<Deck>, SyncError> {
        self.decks.refresh().await
    }

    #[must_use]
    pub fn decks(&self) -> Vec<Deck> {
        self.decks.snapshot()
    }

    #[must_use]
    pub fn deck(&self, id: &DeckId) -> Option<Deck> {
        self.decks.get(id)
    }

    pub fn create_deck(&self, draft: DeckDraft) -> Pending<Deck> {
        self.decks.add(draft)
    }

    /// Deck edits are submitted as a whole, so they are written at once.
    pub fn edit_deck(&self, id: &DeckId, patch: DeckPatch) -> Pending<Deck> {
        self.decks.save(id, patch)
    }

    pub fn delete_deck(&self, id: &DeckId) -> Pending<()> {
        self.decks.delete(id)
    }

    pub fn move_deck(&self, from: usize, to: Option<usize>) -> Pending<bool> {
        self.decks.reorder(from, to)
    }

    /// Decks whose name contains `term` (case-insensitive), optionally
    /// restricted to those carrying `tag`.
    #[must_use]
    pub fn search(&self, term: &str, tag: Option<&str>) -> Vec<Deck> {
        let needle = term.trim().to_lowercase();
        self.decks
            .snapshot()
            .into_iter()
            .filter(|deck| needle.is_empty() || deck.name.to_lowercase().contains(&needle))
            .filter(|deck| tag.is_none_or(|tag| deck.has_tag(tag)))
            .collect()
    }

    /// Every distinct tag name across the user's decks, sorted.
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        self.decks
            .snapshot()
            .iter()
            .flat_map(|deck| deck.tags.iter().map(|tag| tag.name.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SyncError> {
        self.decks.last_error()
    }
}
