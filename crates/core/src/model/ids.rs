use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Separator between a provisional prefix and its counter (`temp-3`).
const PROVISIONAL_SEPARATOR: char = '-';

/// Prefixes used for locally generated placeholder ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionalKind {
    /// A record added through the single-record add path.
    Temp,
    /// A record added by a bulk import.
    Imported,
}

impl ProvisionalKind {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            ProvisionalKind::Temp => "temp",
            ProvisionalKind::Imported => "imported",
        }
    }

    fn matches(id: &str) -> bool {
        [ProvisionalKind::Temp, ProvisionalKind::Imported]
            .iter()
            .any(|kind| {
                id.strip_prefix(kind.prefix())
                    .and_then(|rest| rest.strip_prefix(PROVISIONAL_SEPARATOR))
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            })
    }
}

/// Identifier shared by every record kind held in an ordered collection.
pub trait RecordKey:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Wraps an identifier assigned by the remote store.
    fn from_server(raw: impl Into<String>) -> Self;

    /// Builds a placeholder identifier such as `temp-4` or `imported-0`.
    fn provisional(kind: ProvisionalKind, n: u64) -> Self;

    fn as_str(&self) -> &str;

    /// True while the record has not been confirmed by the remote store.
    fn is_provisional(&self) -> bool {
        ProvisionalKind::matches(self.as_str())
    }
}

/// Unique identifier for a Flashcard
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Creates a new `CardId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl RecordKey for CardId {
    fn from_server(raw: impl Into<String>) -> Self {
        Self::new(raw)
    }

    fn provisional(kind: ProvisionalKind, n: u64) -> Self {
        Self(format!("{}{PROVISIONAL_SEPARATOR}{n}", kind.prefix()))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Deck
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckId(String);

impl DeckId {
    /// Creates a new `DeckId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl RecordKey for DeckId {
    fn from_server(raw: impl Into<String>) -> Self {
        Self::new(raw)
    }

    fn provisional(kind: ProvisionalKind, n: u64) -> Self {
        Self(format!("{}{PROVISIONAL_SEPARATOR}{n}", kind.prefix()))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of the user owning decks.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(u64);

impl TagId {
    /// Creates a new `TagId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({})", self.0)
    }
}

impl fmt::Debug for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeckId({})", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

fn non_blank(s: &str, kind: &str) -> Result<String, ParseIdError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ParseIdError {
            kind: kind.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl FromStr for CardId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        non_blank(s, "CardId").map(CardId)
    }
}

impl FromStr for DeckId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        non_blank(s, "DeckId").map(DeckId)
    }
}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        non_blank(s, "UserId").map(UserId)
    }
}

impl FromStr for TagId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(TagId::new).map_err(|_| ParseIdError {
            kind: "TagId".to_string(),
        })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
