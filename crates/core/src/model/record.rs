use crate::model::ids::RecordKey;
use crate::model::limits::{ContentLimits, ValidationError};

/// A record that lives in a densely ordered collection.
///
/// Flashcards (scoped by deck) and decks (scoped by user) both implement this,
/// so one collection engine serves either list.
pub trait OrderedRecord: Clone + Send + Sync + 'static {
    type Id: RecordKey;
    /// Content supplied when the user creates a record.
    type Draft: Clone + Send + Sync + 'static;
    /// Changed fields sent with an edit.
    type Patch: Clone + Send + Sync + 'static;
    /// Owner of the collection (deck for cards, user for decks).
    type Scope: Clone + Send + Sync + 'static;

    /// Human-readable record kind used in messages ("flashcard", "deck").
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    /// 1-based rank within the collection.
    fn order(&self) -> u32;

    fn set_order(&mut self, order: u32);

    /// Builds the optimistic local record shown before the remote store answers.
    fn provisional(id: Self::Id, order: u32, draft: &Self::Draft, scope: &Self::Scope) -> Self;

    /// # Errors
    ///
    /// Returns `ValidationError` when the draft is empty or exceeds `limits`.
    fn validate_draft(draft: &Self::Draft, limits: &ContentLimits) -> Result<(), ValidationError>;

    /// # Errors
    ///
    /// Returns `ValidationError` when the patch is empty or exceeds `limits`.
    fn validate_patch(patch: &Self::Patch, limits: &ContentLimits) -> Result<(), ValidationError>;

    /// Equality by identity, ignoring content and order.
    fn same_record(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
