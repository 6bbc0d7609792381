//! Collection sync controller.
//!
//! Owns the locally displayed page of books together with its pagination
//! metadata, search term, loading/error flags and the current screen. Every
//! read and write against the remote collection goes through here, and the
//! local page is only replaced once the server has answered.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::{
    domain::{Book, BookDraft, BookId},
    protocol::Pagination,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    error::SyncError,
    transport::{BooksApi, HttpBooksApi, PageCursor},
    ConfirmationGate,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub const LOAD_FALLBACK: &str = "Failed to load books.";
pub const SAVE_FALLBACK: &str = "Failed to save the book.";
pub const DELETE_FALLBACK: &str = "Failed to delete the book.";
pub const DETAIL_FALLBACK: &str = "Failed to load the book.";

/// What the view layer shows. Exactly one screen is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Browsing,
    Editing(Book),
    Creating,
    ViewingDetail(Book),
}

impl Screen {
    fn refers_to(&self, id: BookId) -> bool {
        match self {
            Self::Editing(book) | Self::ViewingDetail(book) => book.id == id,
            Self::Browsing | Self::Creating => false,
        }
    }
}

/// Lifecycle of the most recent page load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    SettledOk,
    SettledError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub books: Vec<Book>,
    pub pagination: Option<Pagination>,
    pub search_term: String,
    pub loading: bool,
    pub last_error: Option<String>,
    pub screen: Screen,
    pub phase: LoadPhase,
    pub cursor: PageCursor,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    StateChanged(SyncSnapshot),
    Error(String),
}

#[derive(Default)]
struct SyncState {
    books: Vec<Book>,
    pagination: Option<Pagination>,
    search_term: String,
    last_error: Option<String>,
    screen: Screen,
    phase: LoadPhase,
    cursor: PageCursor,
    in_flight: usize,
    last_request: u64,
    latest_load: u64,
    /// Records deleted while loads issued up to the paired sequence number
    /// may still be in flight.
    removed: Vec<(u64, BookId)>,
}

impl SyncState {
    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            books: self.books.clone(),
            pagination: self.pagination.clone(),
            search_term: self.search_term.clone(),
            loading: self.in_flight > 0,
            last_error: self.last_error.clone(),
            screen: self.screen.clone(),
            phase: self.phase,
            cursor: self.cursor.clone(),
        }
    }

    fn active_search(&self) -> Option<String> {
        let term = self.search_term.trim();
        (!term.is_empty()).then(|| term.to_string())
    }

    /// Drops records a delete removed after load `seq` was issued, and
    /// forgets removals no later load can see.
    fn apply_removals(&mut self, seq: u64) {
        let removed = &self.removed;
        let before = self.books.len();
        self.books
            .retain(|book| !removed.iter().any(|(at, id)| *at >= seq && *id == book.id));
        let dropped = (before - self.books.len()) as u64;
        if let Some(pagination) = self.pagination.as_mut() {
            pagination.total = pagination.total.saturating_sub(dropped);
        }
        self.removed.retain(|(at, _)| *at >= seq);
    }

    fn begin_request(&mut self) -> u64 {
        self.last_request += 1;
        self.in_flight += 1;
        self.last_error = None;
        self.last_request
    }
}

/// Holds one unit of the loading flag for a remote call. Released exactly
/// once, either through `finish` or on drop when the call is abandoned.
struct InFlight<'a> {
    controller: &'a CollectionSyncController,
    load_seq: Option<u64>,
    finished: bool,
}

impl InFlight<'_> {
    fn update(&self, apply: impl FnOnce(&mut SyncState)) {
        let snapshot = {
            let mut state = self.controller.state();
            apply(&mut state);
            state.snapshot()
        };
        self.controller.publish(snapshot);
    }

    fn finish<R>(mut self, apply: impl FnOnce(&mut SyncState) -> R) -> R {
        self.finished = true;
        let (out, snapshot) = {
            let mut state = self.controller.state();
            let out = apply(&mut state);
            state.in_flight = state.in_flight.saturating_sub(1);
            (out, state.snapshot())
        };
        self.controller.publish(snapshot);
        out
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let snapshot = {
            let mut state = self.controller.state();
            state.in_flight = state.in_flight.saturating_sub(1);
            if let Some(seq) = self.load_seq {
                if state.latest_load == seq && state.phase == LoadPhase::Loading {
                    state.phase = LoadPhase::Idle;
                }
            }
            state.snapshot()
        };
        self.controller.publish(snapshot);
    }
}

pub struct CollectionSyncController {
    api: Arc<dyn BooksApi>,
    confirm: Arc<dyn ConfirmationGate>,
    debounce: Duration,
    state: Mutex<SyncState>,
    pending_search: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl CollectionSyncController {
    pub fn new(api: Arc<dyn BooksApi>, confirm: Arc<dyn ConfirmationGate>) -> Arc<Self> {
        Self::with_debounce(api, confirm, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        api: Arc<dyn BooksApi>,
        confirm: Arc<dyn ConfirmationGate>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            confirm,
            debounce,
            state: Mutex::new(SyncState::default()),
            pending_search: Mutex::new(None),
            events,
        })
    }

    pub fn from_settings(
        settings: &Settings,
        confirm: Arc<dyn ConfirmationGate>,
    ) -> anyhow::Result<Arc<Self>> {
        let api = HttpBooksApi::from_settings(settings)?;
        info!(base_url = %api.base_url(), "books api configured");
        Ok(Self::with_debounce(
            Arc::new(api),
            confirm,
            settings.debounce(),
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state().snapshot()
    }

    pub fn current_cursor(&self) -> PageCursor {
        self.state().cursor.clone()
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: SyncSnapshot) {
        let _ = self.events.send(SyncEvent::StateChanged(snapshot));
    }

    fn report(&self, message: String) {
        let _ = self.events.send(SyncEvent::Error(message));
    }

    fn mutate(&self, apply: impl FnOnce(&mut SyncState)) {
        let snapshot = {
            let mut state = self.state();
            apply(&mut state);
            state.snapshot()
        };
        self.publish(snapshot);
    }

    fn begin(&self, is_load: bool) -> (InFlight<'_>, u64, Option<String>) {
        let (seq, search, snapshot) = {
            let mut state = self.state();
            let seq = state.begin_request();
            if is_load {
                state.latest_load = seq;
                state.phase = LoadPhase::Loading;
            }
            (seq, state.active_search(), state.snapshot())
        };
        self.publish(snapshot);
        let guard = InFlight {
            controller: self,
            load_seq: is_load.then_some(seq),
            finished: false,
        };
        (guard, seq, search)
    }

    /// Fetches the page at `cursor` and replaces the local page with it.
    ///
    /// The previous error is cleared before the request; on failure the
    /// displayed page is left as it was. A response that arrives after a
    /// newer load was issued is dropped without touching state.
    pub async fn load(&self, cursor: PageCursor) -> Result<(), SyncError> {
        let (guard, seq, search) = self.begin(true);
        debug!(seq, ?cursor, search = ?search, "loading books");
        let outcome = self.api.list_books(&cursor, search.as_deref()).await;

        let (result, error_message, loaded) = guard.finish(move |state| {
            if state.latest_load != seq {
                debug!(seq, latest = state.latest_load, "discarding stale page response");
                return (outcome.map(|_| ()), None, None);
            }
            match outcome {
                Ok(response) => {
                    let (books, pagination) = response.into_parts();
                    let page = pagination.as_ref().map(|p| p.current_page);
                    state.books = books;
                    state.pagination = pagination;
                    state.apply_removals(seq);
                    state.cursor = cursor;
                    state.phase = LoadPhase::SettledOk;
                    (Ok(()), None, Some((state.books.len(), page)))
                }
                Err(err) => {
                    let message = err.user_message(LOAD_FALLBACK);
                    state.last_error = Some(message.clone());
                    state.phase = LoadPhase::SettledError;
                    (Err(err), Some(message), None)
                }
            }
        });

        if let Some((count, page)) = loaded {
            info!(count, page = ?page, "books page loaded");
        }
        if let (Err(err), Some(message)) = (&result, error_message) {
            warn!(error = %err, "failed to load books");
            self.report(message);
        }
        result
    }

    pub async fn reload(&self) -> Result<(), SyncError> {
        let cursor = self.current_cursor();
        self.load(cursor).await
    }

    /// Updates the search term now and schedules a reload from the first
    /// page once no further change has arrived for the debounce window.
    pub fn set_search_term(self: &Arc<Self>, term: impl Into<String>) {
        let term = term.into();
        self.mutate(|state| state.search_term = term);

        let controller = Arc::clone(self);
        let delay = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A later keystroke aborts only the sleep, never a request already sent.
            tokio::spawn(async move {
                let _ = controller.load(PageCursor::First).await;
            });
        });

        let previous = self
            .pending_search
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Creates the draft when it has no id, otherwise replaces the remote
    /// record. On success the form closes and the current page is reloaded;
    /// on failure the form stays open with the error set.
    pub async fn save(&self, draft: BookDraft) -> Result<Book, SyncError> {
        let (guard, _, _) = self.begin(false);
        let outcome = match draft.id {
            Some(id) => self.api.update_book(id, &draft).await,
            None => self.api.create_book(&draft).await,
        };

        match outcome {
            Ok(book) => {
                info!(id = %book.id, created = draft.is_new(), "book saved");
                guard.update(|state| state.screen = Screen::Browsing);
                let cursor = self.current_cursor();
                if let Err(err) = self.load(cursor).await {
                    debug!(error = %err, "reload after save failed");
                }
                drop(guard);
                Ok(book)
            }
            Err(err) => {
                let message = err.user_message(SAVE_FALLBACK);
                warn!(error = %err, "failed to save book");
                guard.finish(|state| state.last_error = Some(message.clone()));
                self.report(message);
                Err(err)
            }
        }
    }

    /// Deletes a record after the confirmation gate agrees. Returns
    /// `Ok(false)` when the user declined, in which case nothing is sent.
    pub async fn delete(&self, id: BookId) -> Result<bool, SyncError> {
        let title = self
            .state()
            .books
            .iter()
            .find(|book| book.id == id)
            .map(|book| book.title.clone());
        let prompt = match title {
            Some(title) => format!("Delete \"{title}\" permanently?"),
            None => format!("Delete book {id} permanently?"),
        };
        if !self.confirm.confirm(&prompt).await {
            debug!(%id, "delete declined");
            return Ok(false);
        }

        self.mutate(|state| state.last_error = None);
        match self.api.delete_book(id).await {
            Ok(()) => {
                info!(%id, "book deleted");
                self.mutate(|state| {
                    let fence = state.last_request;
                    state.removed.push((fence, id));
                    let before = state.books.len();
                    state.books.retain(|book| book.id != id);
                    let removed = before - state.books.len();
                    if let Some(pagination) = state.pagination.as_mut() {
                        pagination.total = pagination.total.saturating_sub(removed as u64);
                    }
                    if state.screen.refers_to(id) {
                        state.screen = Screen::Browsing;
                    }
                });
                Ok(true)
            }
            Err(err) => {
                let message = err.user_message(DELETE_FALLBACK);
                warn!(%id, error = %err, "failed to delete book");
                self.mutate(|state| state.last_error = Some(message.clone()));
                self.report(message);
                Err(err)
            }
        }
    }

    /// Fetches one record and shows it in the detail screen.
    pub async fn open_detail(&self, id: BookId) -> Result<Book, SyncError> {
        let (guard, _, _) = self.begin(false);
        match self.api.get_book(id).await {
            Ok(book) => {
                let shown = book.clone();
                guard.finish(|state| state.screen = Screen::ViewingDetail(shown));
                Ok(book)
            }
            Err(err) => {
                let message = err.user_message(DETAIL_FALLBACK);
                warn!(%id, error = %err, "failed to fetch book");
                guard.finish(|state| state.last_error = Some(message.clone()));
                self.report(message);
                Err(err)
            }
        }
    }

    /// Loads the next page when there is one and nothing is in flight.
    pub async fn next_page(&self) -> Result<bool, SyncError> {
        self.follow_page(|pagination| pagination.next_page_url.clone())
            .await
    }

    pub async fn prev_page(&self) -> Result<bool, SyncError> {
        self.follow_page(|pagination| pagination.prev_page_url.clone())
            .await
    }

    async fn follow_page(
        &self,
        pick: impl FnOnce(&Pagination) -> Option<String>,
    ) -> Result<bool, SyncError> {
        let target = {
            let state = self.state();
            if state.in_flight > 0 {
                None
            } else {
                state.pagination.as_ref().and_then(pick)
            }
        };
        let Some(url) = target else {
            return Ok(false);
        };
        self.load(PageCursor::Url(url)).await?;
        Ok(true)
    }

    pub fn select_for_edit(&self, book: Option<Book>) {
        self.mutate(|state| {
            state.screen = book.map(Screen::Editing).unwrap_or_default();
        });
    }

    pub fn select_for_create(&self) {
        self.mutate(|state| state.screen = Screen::Creating);
    }

    pub fn select_for_detail(&self, book: Option<Book>) {
        self.mutate(|state| {
            state.screen = book.map(Screen::ViewingDetail).unwrap_or_default();
        });
    }

    pub fn cancel_edit(&self) {
        self.mutate(|state| state.screen = Screen::Browsing);
    }

    pub fn dismiss_error(&self) {
        self.mutate(|state| state.last_error = None);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
