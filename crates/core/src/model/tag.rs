use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TagId;

const DEFAULT_COLOR: &str = "#000000";

/// A colored label attached to a deck.
///
/// Tags are unsaved (`id` 0) until the deck carrying them is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: TagId,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Tag {
    /// Create an unsaved tag with a trimmed, non-empty name.
    ///
    /// A blank color falls back to black.
    ///
    /// # Errors
    ///
    /// Returns `TagError::EmptyName` if the name is empty after trimming.
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Result<Self, TagError> {
        let raw = name.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TagError::EmptyName);
        }
        let color = color.into();
        let color = if color.trim().is_empty() {
            default_color()
        } else {
            color.trim().to_string()
        };
        Ok(Self {
            id: TagId::default(),
            name: trimmed.to_string(),
            color,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagError {
    #[error("tag name cannot be empty")]
    EmptyName,
}
