use std::collections::HashMap;

use flashdeck_core::model::{Deck, DeckDraft, DeckId, DeckPatch, RecordKey, Tag, TagId, UserId};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::SqliteRepository;
use super::mapping::{db_err, map_tag_row, position_from_i64, position_to_i64, ser};
use crate::repository::{RecordRepository, StorageError};

/// Replaces every tag of `deck_id` and returns them with their row ids.
async fn write_tags(
    tx: &mut Transaction<'_, Sqlite>,
    deck_id: &DeckId,
    tags: &[Tag],
) -> Result<Vec<Tag>, StorageError> {
    sqlx::query("DELETE FROM deck_tags WHERE deck_id = ?1")
        .bind(deck_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

    let mut stored = Vec::with_capacity(tags.len());
    for tag in tags {
        let result = sqlx::query("INSERT INTO deck_tags (deck_id, name, color) VALUES (?1, ?2, ?3)")
            .bind(deck_id.as_str())
            .bind(tag.name.trim())
            .bind(&tag.color)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        let row_id = u64::try_from(result.last_insert_rowid())
            .map_err(|_| ser("tag id sign overflow"))?;
        stored.push(Tag {
            id: TagId::new(row_id),
            name: tag.name.trim().to_owned(),
            color: tag.color.clone(),
        });
    }
    Ok(stored)
}

#[async_trait::async_trait]
impl RecordRepository<Deck> for SqliteRepository {
    async fn fetch(&self, scope: &UserId) -> Result<Vec<Deck>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, name, description, position, is_public
            FROM decks
            WHERE user_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(scope.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        let tag_rows = sqlx::query(
            r"
            SELECT t.id, t.deck_id, t.name, t.color
            FROM deck_tags t
            JOIN decks d ON d.id = t.deck_id
            WHERE d.user_id = ?1
            ORDER BY t.id ASC
            ",
        )
        .bind(scope.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        let mut tags: HashMap<DeckId, Vec<Tag>> = HashMap::new();
        for row in &tag_rows {
            let (deck_id, tag) = map_tag_row(row)?;
            tags.entry(deck_id).or_default().push(tag);
        }

        let mut decks = Vec::with_capacity(rows.len());
        for row in rows {
            let id = DeckId::new(row.try_get::<String, _>("id").map_err(ser)?);
            decks.push(Deck {
                tags: tags.remove(&id).unwrap_or_default(),
                id,
                user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
                name: row.try_get("name").map_err(ser)?,
                description: row.try_get("description").map_err(ser)?,
                order: position_from_i64(row.try_get("position").map_err(ser)?)?,
                is_public: row.try_get("is_public").map_err(ser)?,
            });
        }
        Ok(decks)
    }

    async fn create(
        &self,
        scope: &UserId,
        draft: &DeckDraft,
        order: u32,
    ) -> Result<Deck, StorageError> {
        let id = DeckId::from_server(Uuid::new_v4().to_string());
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO decks (id, user_id, name, description, position, is_public)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id.as_str())
        .bind(scope.as_str())
        .bind(draft.name.trim())
        .bind(draft.description.trim())
        .bind(position_to_i64(order))
        .bind(draft.is_public)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let tags = write_tags(&mut tx, &id, &draft.tags).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(Deck {
            id,
            user_id: scope.clone(),
            name: draft.name.trim().to_owned(),
            description: draft.description.trim().to_owned(),
            tags,
            order,
            is_public: draft.is_public,
        })
    }

    async fn update(&self, id: &DeckId, patch: &DeckPatch) -> Result<Deck, StorageError> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        let row = sqlx::query(
            r"
            UPDATE decks SET name = ?1, description = ?2, is_public = ?3
            WHERE id = ?4
            RETURNING user_id, position
            ",
        )
        .bind(patch.name.trim())
        .bind(patch.description.trim())
        .bind(patch.is_public)
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound)?;

        let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?);
        let order = position_from_i64(row.try_get("position").map_err(ser)?)?;
        let tags = write_tags(&mut tx, id, &patch.tags).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(Deck {
            id: id.clone(),
            user_id,
            name: patch.name.trim().to_owned(),
            description: patch.description.trim().to_owned(),
            tags,
            order,
            is_public: patch.is_public,
        })
    }

    async fn delete(&self, id: &DeckId) -> Result<(), StorageError> {
        // Cards and tags go with the deck via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM decks WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn persist_order(&self, records: &[Deck]) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for deck in records {
            let result = sqlx::query("UPDATE decks SET position = ?1 WHERE id = ?2")
                .bind(position_to_i64(deck.order))
                .bind(deck.id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if result.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(StorageError::NotFound);
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
