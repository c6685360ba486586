use flashdeck_core::model::{CardDraft, CardId, CardPatch, CardScope, Flashcard, RecordKey};
use uuid::Uuid;

use super::SqliteRepository;
use super::mapping::{db_err, map_card_row, position_to_i64};
use crate::repository::{RecordRepository, StorageError};

const CARD_COLUMNS: &str = "id, deck_id, user_id, question, answer, position";

#[async_trait::async_trait]
impl RecordRepository<Flashcard> for SqliteRepository {
    async fn fetch(&self, scope: &CardScope) -> Result<Vec<Flashcard>, StorageError> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM flashcards
             WHERE deck_id = ?1 AND user_id = ?2
             ORDER BY position ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(scope.deck_id.as_str())
            .bind(scope.user_id.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(db_err)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn create(
        &self,
        scope: &CardScope,
        draft: &CardDraft,
        order: u32,
    ) -> Result<Flashcard, StorageError> {
        let card = Flashcard {
            id: CardId::from_server(Uuid::new_v4().to_string()),
            deck_id: scope.deck_id.clone(),
            user_id: scope.user_id.clone(),
            question: draft.question.trim().to_owned(),
            answer: draft.answer.trim().to_owned(),
            order,
        };

        sqlx::query(
            r"
            INSERT INTO flashcards (id, deck_id, user_id, question, answer, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(card.id.as_str())
        .bind(card.deck_id.as_str())
        .bind(card.user_id.as_str())
        .bind(&card.question)
        .bind(&card.answer)
        .bind(position_to_i64(card.order))
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        Ok(card)
    }

    async fn update(&self, id: &CardId, patch: &CardPatch) -> Result<Flashcard, StorageError> {
        let sql = format!(
            "UPDATE flashcards SET question = ?1, answer = ?2
             WHERE id = ?3
             RETURNING {CARD_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(patch.question.trim())
            .bind(patch.answer.trim())
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;

        map_card_row(&row)
    }

    async fn delete(&self, id: &CardId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn persist_order(&self, records: &[Flashcard]) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for card in records {
            let result = sqlx::query("UPDATE flashcards SET position = ?1 WHERE id = ?2")
                .bind(position_to_i64(card.order))
                .bind(card.id.as_str())
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
