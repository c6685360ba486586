use std::sync::Arc;

use flashdeck_core::model::{DeckId, UserId};
use storage::repository::Storage;
use tracing::info;

use crate::card_service::CardService;
use crate::config::SyncConfig;
use crate::deck_service::DeckService;
use crate::error::AppServicesError;

/// Assembles app-facing services for one user over a storage backend.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    config: SyncConfig,
    storage: Storage,
    deck_service: Arc<DeckService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, user_id: UserId, config: SyncConfig) -> Self {
        let deck_service = Arc::new(DeckService::new(
            user_id.clone(),
            Arc::clone(&storage.decks),
            config.clone(),
        ));
        Self {
            user_id,
            config,
            storage,
            deck_service,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the deck
    /// list cannot be loaded.
    pub async fn new_sqlite(
        db_url: &str,
        user_id: UserId,
        config: SyncConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let services = Self::new(storage, user_id, config);
        let decks = services.deck_service.load().await?;
        info!(user = %services.user_id, decks = decks.len(), "opened sqlite storage");
        Ok(services)
    }

    /// Build services backed by the hosted REST API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the base URL is invalid or the deck list
    /// cannot be loaded.
    pub async fn new_http(
        base_url: &str,
        user_id: UserId,
        config: SyncConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::http(base_url, user_id.clone())?;
        let services = Self::new(storage, user_id, config);
        services.deck_service.load().await?;
        Ok(services)
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn deck_service(&self) -> Arc<DeckService> {
        Arc::clone(&self.deck_service)
    }

    /// Open the cards of `deck_id`. Call [`CardService::load`] before use.
    #[must_use]
    pub fn card_service(&self, deck_id: DeckId) -> CardService {
        CardService::new(
            deck_id,
            self.user_id.clone(),
            Arc::clone(&self.storage.cards),
            self.config.clone(),
        )
    }
}
