mod card;
mod deck;
mod ids;
mod limits;
mod record;
mod tag;

pub use ids::{CardId, DeckId, ParseIdError, ProvisionalKind, RecordKey, TagId, UserId};
pub use limits::{ContentLimits, Field, MAX_CONTENT_CHARS, MAX_DECK_NAME_CHARS, ValidationError};
pub use record::OrderedRecord;

pub use card::{CardDraft, CardPatch, CardScope, Flashcard};
pub use deck::{Deck, DeckDraft, DeckPatch};
pub use tag::{Tag, TagError};
