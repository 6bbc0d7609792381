//! Remote collection API: the trait the controller talks to and its reqwest
//! implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Book, BookDraft, BookId},
    error::ApiError,
    protocol::{BookRecordResponse, FieldNames, ListBooksResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::{config::Settings, error::SyncError};

const SEARCH_PARAM: &str = "search";

/// Opaque pointer to a page of the remote collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of the collection (filtered when a search term is active).
    #[default]
    First,
    /// A page URL handed out by the server, absolute or relative to the base.
    Url(String),
}

#[async_trait]
pub trait BooksApi: Send + Sync {
    async fn list_books(
        &self,
        cursor: &PageCursor,
        search: Option<&str>,
    ) -> Result<ListBooksResponse, SyncError>;
    async fn get_book(&self, id: BookId) -> Result<Book, SyncError>;
    async fn create_book(&self, draft: &BookDraft) -> Result<Book, SyncError>;
    async fn update_book(&self, id: BookId, draft: &BookDraft) -> Result<Book, SyncError>;
    async fn delete_book(&self, id: BookId) -> Result<(), SyncError>;
}

pub struct HttpBooksApi {
    http: Client,
    base_url: Url,
    field_names: FieldNames,
}

impl HttpBooksApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            field_names: FieldNames::default(),
        })
    }

    pub fn with_field_names(mut self, field_names: FieldNames) -> Self {
        self.field_names = field_names;
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.base_url()?, settings.request_timeout())?
            .with_field_names(settings.wire_field_names))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn record_url(&self, id: BookId) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Unknown(format!("base url '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push(&id.to_string());
        Ok(url)
    }
}

/// Resolves the URL for a list request. A search term is attached only when
/// it is non-blank and the cursor does not already carry one.
pub fn resolve_list_url(
    base_url: &Url,
    cursor: &PageCursor,
    search: Option<&str>,
) -> Result<Url, SyncError> {
    let mut url = match cursor {
        PageCursor::First => base_url.clone(),
        PageCursor::Url(raw) => base_url
            .join(raw)
            .map_err(|e| SyncError::Unknown(format!("invalid page cursor '{raw}': {e}")))?,
    };

    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        let already_filtered = url.query_pairs().any(|(key, _)| key == SEARCH_PARAM);
        if !already_filtered {
            url.query_pairs_mut().append_pair(SEARCH_PARAM, term);
        }
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = ApiError::message_from_body(&body);
    warn!(status = status.as_u16(), message = ?message, "books api rejected request");
    Err(SyncError::rejected(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

#[async_trait]
impl BooksApi for HttpBooksApi {
    async fn list_books(
        &self,
        cursor: &PageCursor,
        search: Option<&str>,
    ) -> Result<ListBooksResponse, SyncError> {
        let url = resolve_list_url(&self.base_url, cursor, search)?;
        debug!(%url, "listing books");
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        decode(response).await
    }

    async fn get_book(&self, id: BookId) -> Result<Book, SyncError> {
        let response = self
            .http
            .get(self.record_url(id)?)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        decode::<BookRecordResponse>(response)
            .await
            .map(BookRecordResponse::into_book)
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<Book, SyncError> {
        let body = BookDraft {
            id: None,
            ..draft.clone()
        };
        let response = self
            .http
            .post(self.base_url.clone())
            .header(header::ACCEPT, "application/json")
            .json(&self.field_names.draft_body(&body))
            .send()
            .await?;
        decode::<BookRecordResponse>(response)
            .await
            .map(BookRecordResponse::into_book)
    }

    async fn update_book(&self, id: BookId, draft: &BookDraft) -> Result<Book, SyncError> {
        let response = self
            .http
            .put(self.record_url(id)?)
            .header(header::ACCEPT, "application/json")
            .json(&self.field_names.draft_body(draft))
            .send()
            .await?;
        decode::<BookRecordResponse>(response)
            .await
            .map(BookRecordResponse::into_book)
    }

    async fn delete_book(&self, id: BookId) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(self.record_url(id)?)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
