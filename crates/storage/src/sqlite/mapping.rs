use flashdeck_core::model::{CardId, DeckId, Flashcard, Tag, TagId, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors: constraint and other database-reported failures become
/// `Rejected` with the database's code; everything else is a connection failure.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) => StorageError::Rejected {
            code: db.code().map_or_else(|| "database".to_string(), |c| c.into_owned()),
            detail: db.message().to_string(),
        },
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn position_to_i64(order: u32) -> i64 {
    i64::from(order)
}

pub(crate) fn position_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("position out of range: {v}")))
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Flashcard, StorageError> {
    Ok(Flashcard {
        id: CardId::new(row.try_get::<String, _>("id").map_err(ser)?),
        deck_id: DeckId::new(row.try_get::<String, _>("deck_id").map_err(ser)?),
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        question: row.try_get("question").map_err(ser)?,
        answer: row.try_get("answer").map_err(ser)?,
        order: position_from_i64(row.try_get("position").map_err(ser)?)?,
    })
}

pub(crate) fn map_tag_row(row: &SqliteRow) -> Result<(DeckId, Tag), StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let id = u64::try_from(id).map_err(|_| ser("tag id sign overflow"))?;
    let deck_id = DeckId::new(row.try_get::<String, _>("deck_id").map_err(ser)?);
    Ok((
        deck_id,
        Tag {
            id: TagId::new(id),
            name: row.try_get("name").map_err(ser)?,
            color: row.try_get("color").map_err(ser)?,
        },
    ))
}
