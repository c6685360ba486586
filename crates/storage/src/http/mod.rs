//! REST backend speaking the hosted flashcard API.
//!
//! Routes: `/api/flashcard` and `/api/decks`. Non-success responses carrying a
//! JSON `{ "error", "details" }` body become `StorageError::Rejected`; anything
//! else that fails in transit is a `Connection` error.

use std::sync::Arc;

use async_trait::async_trait;
use flashdeck_core::model::{
    CardDraft, CardId, CardPatch, CardScope, Deck, DeckDraft, DeckId, DeckPatch, Flashcard,
    RecordKey, Tag, UserId,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::repository::{RecordRepository, Storage, StorageError};

const CARD_ROUTE: &str = "api/flashcard";
const DECK_ROUTE: &str = "api/decks";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpInitError {
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Clone, Debug)]
pub struct HttpRepository {
    client: Client,
    base: Url,
    user_id: UserId,
}

impl HttpRepository {
    /// Build a client for the API rooted at `base_url`, acting as `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError` if the URL does not parse or is not http(s).
    pub fn new(base_url: &str, user_id: UserId) -> Result<Self, HttpInitError> {
        Self::with_client(Client::new(), base_url, user_id)
    }

    /// # Errors
    ///
    /// Returns `HttpInitError` if the URL does not parse or is not http(s).
    pub fn with_client(
        client: Client,
        base_url: &str,
        user_id: UserId,
    ) -> Result<Self, HttpInitError> {
        let mut base = Url::parse(base_url.trim())?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(HttpInitError::UnsupportedScheme(base.scheme().to_string()));
        }
        // `join` replaces the last segment unless the path ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            user_id,
        })
    }

    fn endpoint(&self, route: &str) -> Result<Url, StorageError> {
        self.base
            .join(route)
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn endpoint_with_query(&self, route: &str, query: &[(&str, &str)]) -> Result<Url, StorageError> {
        let mut url = self.endpoint(route)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl Storage {
    /// Build a `Storage` backed by the REST API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `HttpInitError` if the base URL is invalid.
    pub fn http(base_url: &str, user_id: UserId) -> Result<Self, HttpInitError> {
        let repo = HttpRepository::new(base_url, user_id)?;
        let decks: Arc<dyn RecordRepository<Deck>> = Arc::new(repo.clone());
        let cards: Arc<dyn RecordRepository<Flashcard>> = Arc::new(repo);
        Ok(Self { decks, cards })
    }
}

//
// ─── ERROR MAPPING ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

fn transport(e: &reqwest::Error) -> StorageError {
    if e.is_decode() {
        StorageError::Serialization(e.to_string())
    } else {
        StorageError::Connection(e.to_string())
    }
}

/// Maps a non-success status and its raw body to a storage error.
pub(crate) fn error_from_body(status: StatusCode, body: &str) -> StorageError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return StorageError::Rejected {
            code: parsed.error,
            detail: parsed.details.unwrap_or_default(),
        };
    }
    if status == StatusCode::NOT_FOUND {
        return StorageError::NotFound;
    }
    StorageError::Connection(format!("unexpected status {status}"))
}

async fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(%status, %url, "failed to read error body");
            return Err(transport(&e));
        }
    };
    let err = error_from_body(status, &body);
    if matches!(err, StorageError::Connection(_)) {
        warn!(%status, %url, "request failed");
    } else {
        debug!(%status, %url, code = err.code(), "request rejected");
    }
    Err(err)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    let response = ensure_success(response).await?;
    response.json::<T>().await.map_err(|e| transport(&e))
}

//
// ─── REQUEST BODIES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCardBody<'a> {
    question: &'a str,
    answer: &'a str,
    user_id: &'a UserId,
    deck_id: &'a DeckId,
    order: u32,
}

#[derive(Debug, Serialize)]
struct CardEditBody<'a> {
    id: &'a CardId,
    question: &'a str,
    answer: &'a str,
}

#[derive(Debug, Serialize)]
struct CardIdBody<'a> {
    id: &'a CardId,
}

#[derive(Debug, Serialize)]
struct CardOrderBody<'a> {
    flashcards: &'a [Flashcard],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    deck_id: Option<&'a DeckId>,
    name: &'a str,
    description: &'a str,
    user_id: &'a UserId,
    tags: &'a [Tag],
    is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckDeleteBody<'a> {
    deck_id: &'a DeckId,
    user_id: &'a UserId,
}

#[derive(Debug, Serialize)]
struct DeckOrderBody<'a> {
    decks: &'a [Deck],
}

//
// ─── FLASHCARDS ────────────────────────────────────────────────────────────────
//

#[async_trait]
impl RecordRepository<Flashcard> for HttpRepository {
    async fn fetch(&self, scope: &CardScope) -> Result<Vec<Flashcard>, StorageError> {
        let url = self.endpoint_with_query(
            CARD_ROUTE,
            &[
                ("userId", scope.user_id.as_str()),
                ("deckId", scope.deck_id.as_str()),
            ],
        )?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn create(
        &self,
        scope: &CardScope,
        draft: &CardDraft,
        order: u32,
    ) -> Result<Flashcard, StorageError> {
        let body = NewCardBody {
            question: &draft.question,
            answer: &draft.answer,
            user_id: &scope.user_id,
            deck_id: &scope.deck_id,
            order,
        };
        let response = self
            .client
            .post(self.endpoint(CARD_ROUTE)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn update(&self, id: &CardId, patch: &CardPatch) -> Result<Flashcard, StorageError> {
        let body = CardEditBody {
            id,
            question: &patch.question,
            answer: &patch.answer,
        };
        let response = self
            .client
            .put(self.endpoint(CARD_ROUTE)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn delete(&self, id: &CardId) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.endpoint(CARD_ROUTE)?)
            .json(&CardIdBody { id })
            .send()
            .await
            .map_err(|e| transport(&e))?;
        ensure_success(response).await.map(|_| ())
    }

    async fn persist_order(&self, records: &[Flashcard]) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(self.endpoint(CARD_ROUTE)?)
            .json(&CardOrderBody {
                flashcards: records,
            })
            .send()
            .await
            .map_err(|e| transport(&e))?;
        ensure_success(response).await.map(|_| ())
    }
}

//
// ─── DECKS ─────────────────────────────────────────────────────────────────────
//

#[async_trait]
impl RecordRepository<Deck> for HttpRepository {
    async fn fetch(&self, scope: &UserId) -> Result<Vec<Deck>, StorageError> {
        let url = self.endpoint_with_query(DECK_ROUTE, &[("userId", scope.as_str())])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn create(
        &self,
        scope: &UserId,
        draft: &DeckDraft,
        order: u32,
    ) -> Result<Deck, StorageError> {
        let body = DeckBody {
            deck_id: None,
            name: &draft.name,
            description: &draft.description,
            user_id: scope,
            tags: &draft.tags,
            is_public: draft.is_public,
            order: Some(order),
        };
        let response = self
            .client
            .post(self.endpoint(DECK_ROUTE)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn update(&self, id: &DeckId, patch: &DeckPatch) -> Result<Deck, StorageError> {
        let body = DeckBody {
            deck_id: Some(id),
            name: &patch.name,
            description: &patch.description,
            user_id: &self.user_id,
            tags: &patch.tags,
            is_public: patch.is_public,
            order: None,
        };
        let response = self
            .client
            .put(self.endpoint(DECK_ROUTE)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        read_json(response).await
    }

    async fn delete(&self, id: &DeckId) -> Result<(), StorageError> {
        let body = DeckDeleteBody {
            deck_id: id,
            user_id: &self.user_id,
        };
        let response = self
            .client
            .delete(self.endpoint(DECK_ROUTE)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(&e))?;
        ensure_success(response).await.map(|_| ())
    }

    async fn persist_order(&self, records: &[Deck]) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(self.endpoint(DECK_ROUTE)?)
            .json(&DeckOrderBody { decks: records })
            .send()
            .await
            .map_err(|e| transport(&e))?;
        ensure_success(response).await.map(|_| ())
    }
}
