use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::{load_settings, load_settings_from},
    CollectionSyncController, PageCursor, Screen, SyncEvent, SyncSnapshot,
};
use shared::{domain::BookDraft, protocol::FieldNames};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::RecvError, mpsc, Mutex},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod intents;
mod prompt;
mod render;

use intents::{parse_intent, Intent, HELP};
use prompt::{PromptGate, SharedLines};

#[derive(Parser, Debug)]
struct Args {
    /// Books collection URL, e.g. http://localhost:8000/api/books
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    debounce_ms: Option<u64>,
    /// Key set for create/update bodies: en or it
    #[arg(long)]
    wire_field_names: Option<FieldNames>,
    /// Config file used instead of ./bookshelf.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

type SharedDraft = Arc<Mutex<Option<BookDraft>>>;

fn spawn_stdin_reader() -> SharedLines {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

fn spawn_renderer(controller: &CollectionSyncController, draft: SharedDraft) {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        let mut last: Option<SyncSnapshot> = None;
        loop {
            match events.recv().await {
                Ok(SyncEvent::StateChanged(snapshot)) => {
                    if last.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    let text = render::render(&snapshot, draft.lock().await.as_ref());
                    println!("{text}");
                    last = Some(snapshot);
                }
                Ok(SyncEvent::Error(message)) => debug!(%message, "controller reported error"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "renderer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Drops the local draft together with the controller's form screen.
async fn close_form(controller: &CollectionSyncController, draft: &SharedDraft) {
    *draft.lock().await = None;
    controller.cancel_edit();
}

async fn handle_intent(
    controller: &Arc<CollectionSyncController>,
    draft: &SharedDraft,
    intent: Intent,
) -> Result<()> {
    match intent {
        Intent::Search(term) => {
            if !matches!(controller.snapshot().screen, Screen::Browsing) {
                close_form(controller, draft).await;
            }
            controller.set_search_term(term);
        }
        Intent::NextPage => {
            if let Ok(false) = controller.next_page().await {
                println!("no next page");
            }
        }
        Intent::PrevPage => {
            if let Ok(false) = controller.prev_page().await {
                println!("no previous page");
            }
        }
        Intent::Reload => {
            let _ = controller.reload().await;
        }
        Intent::ShowDetails(id) => {
            let _ = controller.open_detail(id).await;
        }
        Intent::Edit(id) => {
            let book = controller
                .snapshot()
                .books
                .into_iter()
                .find(|book| book.id == id);
            match book {
                Some(book) => {
                    *draft.lock().await = Some(BookDraft::from(&book));
                    controller.select_for_edit(Some(book));
                }
                None => println!("book {id} is not on the current page"),
            }
        }
        Intent::New => {
            *draft.lock().await = Some(BookDraft::blank());
            controller.select_for_create();
        }
        Intent::SetField { field, value } => {
            let mut guard = draft.lock().await;
            let Some(current) = guard.as_mut() else {
                println!("no form is open; use new or edit <id>");
                return Ok(());
            };
            field.apply(current, &value)?;
            let mut text = String::new();
            render::render_draft(&mut text, "Draft", current);
            println!("{text}");
        }
        Intent::Save => {
            let pending = draft.lock().await.clone();
            let Some(pending) = pending else {
                println!("no form is open; use new or edit <id>");
                return Ok(());
            };
            if controller.save(pending).await.is_ok() {
                *draft.lock().await = None;
            }
        }
        Intent::Cancel => close_form(controller, draft).await,
        Intent::Delete(id) => {
            let _ = controller.delete(id).await;
        }
        Intent::DismissError => controller.dismiss_error(),
        Intent::Help => println!("{HELP}"),
        Intent::Quit => unreachable!("quit is handled by the command loop"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    if let Some(url) = args.api_base_url {
        settings.api_base_url = url;
    }
    if let Some(debounce_ms) = args.debounce_ms {
        settings.debounce_ms = debounce_ms;
    }
    if let Some(names) = args.wire_field_names {
        settings.wire_field_names = names;
    }

    let lines = spawn_stdin_reader();
    let controller = CollectionSyncController::from_settings(
        &settings,
        Arc::new(PromptGate::new(Arc::clone(&lines))),
    )?;
    info!(api_base_url = %settings.api_base_url, "starting bookshelf");

    let draft: SharedDraft = Arc::new(Mutex::new(None));
    spawn_renderer(&controller, Arc::clone(&draft));
    println!("{HELP}");
    let _ = controller.load(PageCursor::First).await;

    loop {
        let next = lines.lock().await.recv().await;
        let Some(line) = next else {
            break;
        };
        let intent = match parse_intent(&line) {
            Ok(intent) => intent,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if intent == Intent::Quit {
            break;
        }
        if let Err(err) = handle_intent(&controller, &draft, intent).await {
            println!("{err}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{config::Settings, AlwaysConfirm};

    fn offline_controller() -> Arc<CollectionSyncController> {
        let settings = Settings {
            api_base_url: "http://127.0.0.1:9/api/books".into(),
            debounce_ms: 3_600_000,
            ..Settings::default()
        };
        CollectionSyncController::from_settings(&settings, Arc::new(AlwaysConfirm))
            .expect("controller")
    }

    #[tokio::test]
    async fn search_closes_open_form_and_discards_draft() {
        let controller = offline_controller();
        let draft: SharedDraft = Arc::new(Mutex::new(Some(BookDraft::blank())));
        controller.select_for_create();

        handle_intent(&controller, &draft, Intent::Search("dune".into()))
            .await
            .expect("search");

        assert!(draft.lock().await.is_none());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.screen, Screen::Browsing);
        assert_eq!(snapshot.search_term, "dune");

        handle_intent(&controller, &draft, Intent::Save)
            .await
            .expect("save without form");
        assert_eq!(controller.snapshot().screen, Screen::Browsing);
        assert!(!controller.snapshot().loading);
    }

    #[tokio::test]
    async fn cancel_drops_draft() {
        let controller = offline_controller();
        let draft: SharedDraft = Arc::new(Mutex::new(Some(BookDraft::blank())));
        controller.select_for_create();

        handle_intent(&controller, &draft, Intent::Cancel)
            .await
            .expect("cancel");

        assert!(draft.lock().await.is_none());
        assert_eq!(controller.snapshot().screen, Screen::Browsing);
    }
}
