//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use flashdeck_core::model::ValidationError;
use storage::http::HttpInitError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Remote step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    Fetch,
    Create,
    Update,
    Delete,
    PersistOrder,
}

impl SyncAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Fetch => "fetch",
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
            SyncAction::PersistOrder => "reorder",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by ordered collections.
///
/// This is the single "current error" value the UI displays; it is `Clone` so
/// the status board can hand copies to every subscriber.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SyncError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("failed to {action} {kind}: {source}")]
    Remote {
        action: SyncAction,
        kind: &'static str,
        source: StorageError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} {id} is not saved yet")]
    Unconfirmed { kind: &'static str, id: String },

    #[error("collection is read-only")]
    ReadOnly,
}

impl SyncError {
    pub(crate) fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn unconfirmed(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::Unconfirmed {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn remote(action: SyncAction, kind: &'static str, source: StorageError) -> Self {
        Self::Remote {
            action,
            kind,
            source,
        }
    }

    /// Storage failure behind a remote error, if any.
    #[must_use]
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            SyncError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Http(#[from] HttpInitError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_action_and_detail() {
        let err = SyncError::remote(
            SyncAction::Create,
            "flashcard",
            StorageError::rejected("Failed to add flashcard", "timeout"),
        );
        assert_eq!(
            err.to_string(),
            "failed to create flashcard: Failed to add flashcard: timeout"
        );
        assert_eq!(err.storage().map(StorageError::code), Some("Failed to add flashcard"));
    }

    #[test]
    fn not_found_names_record() {
        let err = SyncError::not_found("deck", "srv-9");
        assert_eq!(err.to_string(), "deck srv-9 not found");
        assert!(err.storage().is_none());
    }
}
