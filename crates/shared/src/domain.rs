use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(BookId);

/// A catalog record the backend has persisted.
///
/// The backend may still speak the Italian field names, so those are
/// accepted on decode. Fields the backend leaves out decode as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    #[serde(default, alias = "titolo")]
    pub title: String,
    #[serde(default, alias = "autore")]
    pub author: String,
    #[serde(default, alias = "anno")]
    pub year: i32,
    #[serde(default, alias = "genere")]
    pub genre: String,
    #[serde(default, alias = "descrizione")]
    pub description: String,
}

/// Book-shaped record sent on create and update. `id` is only set when the
/// draft edits a record that already exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BookId>,
    #[serde(default, alias = "titolo")]
    pub title: String,
    #[serde(default, alias = "autore")]
    pub author: String,
    #[serde(default, alias = "anno")]
    pub year: i32,
    #[serde(default, alias = "genere")]
    pub genre: String,
    #[serde(default, alias = "descrizione")]
    pub description: String,
}

impl BookDraft {
    /// Empty create-form draft, dated to the current year.
    pub fn blank() -> Self {
        Self {
            id: None,
            title: String::new(),
            author: String::new(),
            year: Utc::now().year(),
            genre: String::new(),
            description: String::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

impl From<&Book> for BookDraft {
    fn from(book: &Book) -> Self {
        Self {
            id: Some(book.id),
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year,
            genre: book.genre.clone(),
            description: book.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_italian_field_names() {
        let book: Book = serde_json::from_str(
            r#"{"id":4,"titolo":"Il nome della rosa","autore":"Eco","anno":1980,"genere":"Giallo","descrizione":"Abbazia"}"#,
        )
        .expect("decode");
        assert_eq!(book.id, BookId(4));
        assert_eq!(book.title, "Il nome della rosa");
        assert_eq!(book.author, "Eco");
        assert_eq!(book.year, 1980);
    }

    #[test]
    fn new_draft_serializes_without_id() {
        let draft = BookDraft {
            title: "Dune".into(),
            ..BookDraft::blank()
        };
        let value = serde_json::to_value(&draft).expect("encode");
        assert!(value.get("id").is_none());
        assert_eq!(value["title"], "Dune");
        assert!(draft.is_new());
    }

    #[test]
    fn draft_from_saved_book_keeps_id() {
        let book = Book {
            id: BookId(9),
            title: "Dune".into(),
            author: "Herbert".into(),
            year: 1965,
            genre: "SF".into(),
            description: String::new(),
        };
        let draft = BookDraft::from(&book);
        assert_eq!(draft.id, Some(BookId(9)));
        assert_eq!(draft.title, "Dune");
        assert_eq!(draft.year, 1965);
        assert!(!draft.is_new());
    }
}
