use serde::{Deserialize, Serialize};

use crate::model::ids::{DeckId, UserId};
use crate::model::limits::{ContentLimits, Field, ValidationError};
use crate::model::record::OrderedRecord;
use crate::model::tag::Tag;

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named, ordered collection of flashcards owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub order: u32,
    #[serde(default)]
    pub is_public: bool,
}

impl Deck {
    #[must_use]
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}

/// Content of a deck being created or edited.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDraft {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub is_public: bool,
}

impl DeckDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Edits share the draft shape; every field is replaced.
pub type DeckPatch = DeckDraft;

impl OrderedRecord for Deck {
    type Id = DeckId;
    type Draft = DeckDraft;
    type Patch = DeckPatch;
    type Scope = UserId;

    const KIND: &'static str = "deck";

    fn id(&self) -> &DeckId {
        &self.id
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    fn provisional(id: DeckId, order: u32, draft: &DeckDraft, scope: &UserId) -> Self {
        Self {
            id,
            user_id: scope.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            order,
            is_public: draft.is_public,
        }
    }

    fn validate_draft(draft: &DeckDraft, limits: &ContentLimits) -> Result<(), ValidationError> {
        limits.check_deck_name(&draft.name)?;
        if draft.description.trim().is_empty() {
            return Err(ValidationError::EmptyField(Field::DeckDescription));
        }
        Ok(())
    }

    fn validate_patch(patch: &DeckPatch, limits: &ContentLimits) -> Result<(), ValidationError> {
        // Existing decks may have been saved without a description.
        limits.check_deck_name(&patch.name)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_description() {
        let err = Deck::validate_draft(&DeckDraft::new("German", "  "), &ContentLimits::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyField(Field::DeckDescription));
    }

    #[test]
    fn draft_rejects_long_name() {
        let draft = DeckDraft::new("A very long deck name here", "desc");
        let err = Deck::validate_draft(&draft, &ContentLimits::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLong {
                field: Field::DeckName,
                limit: 20,
                ..
            }
        ));
    }

    #[test]
    fn patch_allows_blank_description() {
        assert!(Deck::validate_patch(&DeckDraft::new("French", ""), &ContentLimits::default()).is_ok());
    }

    #[test]
    fn provisional_deck_copies_draft() {
        let tag = Tag::new("lang", "#ff0000").unwrap();
        let draft = DeckDraft::new("Spanish", "verbs")
            .with_tags(vec![tag.clone()])
            .public(true);
        let deck = Deck::provisional(DeckId::new("temp-1"), 2, &draft, &UserId::new("u1"));

        assert_eq!(deck.name, "Spanish");
        assert_eq!(deck.order, 2);
        assert!(deck.is_public);
        assert!(deck.has_tag("lang"));
        assert_eq!(deck.tags, vec![tag]);
    }
}
