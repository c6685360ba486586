#![forbid(unsafe_code)]

pub mod app_services;
pub mod card_service;
pub mod coalescer;
pub mod collection;
pub mod config;
pub mod deck_service;
pub mod error;
pub mod import;
pub mod status;

pub use app_services::AppServices;
pub use card_service::CardService;
pub use coalescer::WriteCoalescer;
pub use collection::{OrderedCollection, Pending};
pub use config::{ReorderFailurePolicy, SyncConfig};
pub use deck_service::DeckService;
pub use error::{AppServicesError, SyncAction, SyncError};
pub use import::{ImportFailure, ImportReport};
pub use status::StatusBoard;
