use thiserror::Error;

/// Character ceiling for a card question or answer.
pub const MAX_CONTENT_CHARS: usize = 930;

/// Character ceiling for a deck name.
pub const MAX_DECK_NAME_CHARS: usize = 20;

/// Field named in a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Question,
    Answer,
    DeckName,
    DeckDescription,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Question => "question",
            Field::Answer => "answer",
            Field::DeckName => "deck name",
            Field::DeckDescription => "deck description",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    EmptyField(Field),

    #[error("{field} exceeds {limit} character limit ({actual} characters)")]
    TooLong {
        field: Field,
        limit: usize,
        actual: usize,
    },
}

/// Size bounds applied to user-authored content before any remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub max_content_chars: usize,
    pub max_deck_name_chars: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_content_chars: MAX_CONTENT_CHARS,
            max_deck_name_chars: MAX_DECK_NAME_CHARS,
        }
    }
}

impl ContentLimits {
    /// Checks a card question or answer against the content ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` for blank text and
    /// `ValidationError::TooLong` past the ceiling.
    pub fn check_content(&self, field: Field, text: &str) -> Result<(), ValidationError> {
        check(field, text, self.max_content_chars)
    }

    /// Checks a deck name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name is blank or too long.
    pub fn check_deck_name(&self, name: &str) -> Result<(), ValidationError> {
        check(Field::DeckName, name, self.max_deck_name_chars)
    }
}

// Lengths are counted in characters, not bytes.
fn check(field: Field, text: &str, limit: usize) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    let actual = text.chars().count();
    if actual > limit {
        return Err(ValidationError::TooLong {
            field,
            limit,
            actual,
        });
    }
    Ok(())
}
