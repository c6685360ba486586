use serde::{Deserialize, Serialize};

use crate::model::ids::{CardId, DeckId, UserId};
use crate::model::limits::{ContentLimits, Field, ValidationError};
use crate::model::record::OrderedRecord;

//
// ─── CARD TYPES ────────────────────────────────────────────────────────────────
//

/// Owner keys of a card collection. Immutable once a card is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardScope {
    pub deck_id: DeckId,
    pub user_id: UserId,
}

impl CardScope {
    #[must_use]
    pub fn new(deck_id: DeckId, user_id: UserId) -> Self {
        Self { deck_id, user_id }
    }
}

/// A question/answer pair with its position in a deck.
///
/// `question` and `answer` may carry lightweight markup; it is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: CardId,
    pub deck_id: DeckId,
    pub user_id: UserId,
    pub question: String,
    pub answer: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub question: String,
    pub answer: String,
}

impl CardDraft {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// The blank card created by a plain "add card" action.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new("Term", "Definition")
    }
}

/// Edited card content. Both fields are always sent together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPatch {
    pub question: String,
    pub answer: String,
}

impl CardPatch {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

fn check_pair(limits: &ContentLimits, question: &str, answer: &str) -> Result<(), ValidationError> {
    limits.check_content(Field::Question, question)?;
    limits.check_content(Field::Answer, answer)
}

impl OrderedRecord for Flashcard {
    type Id = CardId;
    type Draft = CardDraft;
    type Patch = CardPatch;
    type Scope = CardScope;

    const KIND: &'static str = "flashcard";

    fn id(&self) -> &CardId {
        &self.id
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    fn provisional(id: CardId, order: u32, draft: &CardDraft, scope: &CardScope) -> Self {
        Self {
            id,
            deck_id: scope.deck_id.clone(),
            user_id: scope.user_id.clone(),
            question: draft.question.clone(),
            answer: draft.answer.clone(),
            order,
        }
    }

    fn validate_draft(draft: &CardDraft, limits: &ContentLimits) -> Result<(), ValidationError> {
        check_pair(limits, &draft.question, &draft.answer)
    }

    fn validate_patch(patch: &CardPatch, limits: &ContentLimits) -> Result<(), ValidationError> {
        check_pair(limits, &patch.question, &patch.answer)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
