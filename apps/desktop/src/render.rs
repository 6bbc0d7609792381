use std::fmt::Write as _;

use client_core::{Screen, SyncSnapshot};
use shared::domain::{Book, BookDraft};

fn book_line(book: &Book) -> String {
    format!(
        "  [{}] {} - {} ({}, {})",
        book.id, book.title, book.author, book.year, book.genre
    )
}

fn render_list(out: &mut String, snapshot: &SyncSnapshot) {
    if snapshot.loading {
        out.push_str("Loading...\n");
        return;
    }
    if snapshot.books.is_empty() {
        out.push_str("  (no books)\n");
    }
    for book in &snapshot.books {
        let _ = writeln!(out, "{}", book_line(book));
    }
    if let Some(pagination) = &snapshot.pagination {
        let prev = if pagination.prev_page_url.is_some() { "<prev" } else { "     " };
        let next = if pagination.next_page_url.is_some() { "next>" } else { "     " };
        let _ = writeln!(
            out,
            "  {prev}  page {} / {}  ({} total)  {next}",
            pagination.current_page, pagination.last_page, pagination.total
        );
    }
}

fn render_detail(out: &mut String, book: &Book) {
    let _ = writeln!(out, "{}", book.title);
    let _ = writeln!(out, "  by {} ({})", book.author, book.year);
    let _ = writeln!(out, "  genre: {}", book.genre);
    let _ = writeln!(out, "  {}", book.description);
    out.push_str("  (back to return)\n");
}

pub fn render_draft(out: &mut String, heading: &str, draft: &BookDraft) {
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "  title:       {}", draft.title);
    let _ = writeln!(out, "  author:      {}", draft.author);
    let _ = writeln!(out, "  year:        {}", draft.year);
    let _ = writeln!(out, "  genre:       {}", draft.genre);
    let _ = writeln!(out, "  description: {}", draft.description);
    out.push_str("  (set <field> <value>, then save or cancel)\n");
}

/// Text for the current screen. The form is drawn from the local draft,
/// which only the view layer edits.
pub fn render(snapshot: &SyncSnapshot, draft: Option<&BookDraft>) -> String {
    let mut out = String::new();
    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "!! {error}  (dismiss to hide)");
    }
    if !snapshot.search_term.is_empty() {
        let _ = writeln!(out, "search: {}", snapshot.search_term);
    }

    match &snapshot.screen {
        Screen::Browsing => render_list(&mut out, snapshot),
        Screen::ViewingDetail(book) => render_detail(&mut out, book),
        Screen::Editing(book) => {
            let fallback = BookDraft::from(book);
            render_draft(&mut out, "Edit book", draft.unwrap_or(&fallback));
        }
        Screen::Creating => {
            let fallback = BookDraft::blank();
            render_draft(&mut out, "New book", draft.unwrap_or(&fallback));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{domain::BookId, protocol::Pagination};

    fn dune() -> Book {
        Book {
            id: BookId(1),
            title: "Dune".into(),
            author: "Herbert".into(),
            year: 1965,
            genre: "SF".into(),
            description: "Spice.".into(),
        }
    }

    #[test]
    fn list_shows_books_pagination_and_error() {
        let snapshot = SyncSnapshot {
            books: vec![dune()],
            pagination: Some(Pagination {
                current_page: 1,
                last_page: 2,
                prev_page_url: None,
                next_page_url: Some("http://x/api/books?page=2".into()),
                total: 3,
                links: Vec::new(),
            }),
            last_error: Some("Failed to delete the book.".into()),
            ..SyncSnapshot::default()
        };
        let text = render(&snapshot, None);
        assert!(text.starts_with("!! Failed to delete the book."));
        assert!(text.contains("[1] Dune - Herbert (1965, SF)"));
        assert!(text.contains("page 1 / 2  (3 total)  next>"));
        assert!(!text.contains("<prev"));
    }

    #[test]
    fn loading_hides_the_list() {
        let snapshot = SyncSnapshot {
            books: vec![dune()],
            loading: true,
            ..SyncSnapshot::default()
        };
        let text = render(&snapshot, None);
        assert!(text.contains("Loading..."));
        assert!(!text.contains("Dune"));
    }

    #[test]
    fn edit_form_prefers_local_draft() {
        let snapshot = SyncSnapshot {
            screen: Screen::Editing(dune()),
            ..SyncSnapshot::default()
        };
        let mut draft = BookDraft::from(&dune());
        draft.title = "Dune Messiah".into();
        let text = render(&snapshot, Some(&draft));
        assert!(text.contains("Edit book"));
        assert!(text.contains("title:       Dune Messiah"));
    }

    #[test]
    fn detail_screen_shows_description() {
        let snapshot = SyncSnapshot {
            screen: Screen::ViewingDetail(dune()),
            ..SyncSnapshot::default()
        };
        let text = render(&snapshot, None);
        assert!(text.contains("by Herbert (1965)"));
        assert!(text.contains("Spice."));
    }
}
