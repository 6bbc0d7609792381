use async_trait::async_trait;

pub mod config;
mod controller;
pub mod error;
pub mod transport;

pub use controller::{
    CollectionSyncController, LoadPhase, Screen, SyncEvent, SyncSnapshot,
    DELETE_FALLBACK, DETAIL_FALLBACK, LOAD_FALLBACK, SAVE_FALLBACK,
};
pub use error::SyncError;
pub use transport::{BooksApi, HttpBooksApi, PageCursor};

/// Yes/no step that must pass before an irreversible action is sent.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

pub struct AlwaysConfirm;

#[async_trait]
impl ConfirmationGate for AlwaysConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub struct NeverConfirm;

#[async_trait]
impl ConfirmationGate for NeverConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;
