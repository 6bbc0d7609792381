use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Book, BookDraft, BookId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub active: bool,
}

/// Paginator metadata that accompanies an enveloped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub prev_page_url: Option<String>,
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPageEnvelope {
    pub data: Vec<Book>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub prev_page_url: Option<String>,
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Paginators emit either a list of numbered links or a
    /// `{first, last, prev, next}` object; only the list form is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<serde_json::Value>,
}

/// Response of the list endpoint: either a bare array or a paginated envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListBooksResponse {
    Bare(Vec<Book>),
    Envelope(BookPageEnvelope),
}

impl ListBooksResponse {
    /// Splits the response into the page of books and its pagination
    /// metadata. An envelope without `current_page` counts as unpaginated.
    pub fn into_parts(self) -> (Vec<Book>, Option<Pagination>) {
        match self {
            Self::Bare(books) => (books, None),
            Self::Envelope(envelope) => {
                let Some(current_page) = envelope.current_page else {
                    return (envelope.data, None);
                };
                let links = envelope
                    .links
                    .and_then(|value| serde_json::from_value::<Vec<PageLink>>(value).ok())
                    .unwrap_or_default();
                let pagination = Pagination {
                    current_page,
                    last_page: envelope.last_page.unwrap_or(current_page),
                    prev_page_url: envelope.prev_page_url,
                    next_page_url: envelope.next_page_url,
                    total: envelope
                        .total
                        .unwrap_or(envelope.data.len() as u64),
                    links,
                };
                (envelope.data, Some(pagination))
            }
        }
    }
}

/// Single-record response: bare or wrapped under `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookRecordResponse {
    Wrapped { data: Book },
    Bare(Book),
}

impl BookRecordResponse {
    pub fn into_book(self) -> Book {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(book) => book,
        }
    }
}

/// Key set used for book fields in request bodies. Responses are accepted
/// in either set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldNames {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "it")]
    Italian,
}

impl FromStr for FieldNames {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "it" | "italian" => Ok(Self::Italian),
            other => Err(format!("unknown field name set '{other}', expected 'en' or 'it'")),
        }
    }
}

impl FieldNames {
    pub fn draft_body(self, draft: &BookDraft) -> DraftBody<'_> {
        match self {
            Self::English => DraftBody::English(draft),
            Self::Italian => DraftBody::Italian(ItalianDraft {
                id: draft.id,
                titolo: &draft.title,
                autore: &draft.author,
                anno: draft.year,
                genere: &draft.genre,
                descrizione: &draft.description,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItalianDraft<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<BookId>,
    titolo: &'a str,
    autore: &'a str,
    anno: i32,
    genere: &'a str,
    descrizione: &'a str,
}

/// Create/update request body in the configured key set.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DraftBody<'a> {
    English(&'a BookDraft),
    Italian(ItalianDraft<'a>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_list_has_no_pagination() {
        let response: ListBooksResponse =
            serde_json::from_str(r#"[{"id":1,"title":"Dune","author":"Herbert","year":1965,"genre":"SF","description":""}]"#)
                .expect("decode");
        let (books, pagination) = response.into_parts();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, BookId(1));
        assert!(pagination.is_none());
    }

    #[test]
    fn envelope_carries_paginator_metadata() {
        let body = r#"{
            "data": [{"id":3,"title":"Emma","author":"Austen","year":1815,"genre":"Novel","description":""}],
            "current_page": 2,
            "last_page": 3,
            "prev_page_url": "http://localhost/api/books?page=1",
            "next_page_url": "http://localhost/api/books?page=3",
            "total": 7,
            "links": [{"url": null, "label": "&laquo; Previous", "active": false},
                      {"url": "http://localhost/api/books?page=2", "label": "2", "active": true}]
        }"#;
        let (books, pagination) = serde_json::from_str::<ListBooksResponse>(body)
            .expect("decode")
            .into_parts();
        let pagination = pagination.expect("pagination");
        assert_eq!(books[0].title, "Emma");
        assert_eq!(pagination.current_page, 2);
        assert_eq!(pagination.last_page, 3);
        assert_eq!(pagination.total, 7);
        assert_eq!(pagination.links.len(), 2);
        assert!(pagination.links[1].active);
    }

    #[test]
    fn envelope_without_current_page_is_unpaginated() {
        let (books, pagination) = serde_json::from_str::<ListBooksResponse>(r#"{"data": []}"#)
            .expect("decode")
            .into_parts();
        assert!(books.is_empty());
        assert!(pagination.is_none());
    }

    #[test]
    fn objects_without_data_are_rejected() {
        for body in [
            r#"{"message":"Server Error"}"#,
            r#"{"id":1,"title":"Dune"}"#,
            r#"{"current_page":1,"total":0}"#,
        ] {
            assert!(
                serde_json::from_str::<ListBooksResponse>(body).is_err(),
                "{body} must not decode as a page"
            );
        }
    }

    #[test]
    fn resource_style_links_object_is_tolerated() {
        let body = r#"{"data": [], "current_page": 1, "last_page": 1, "total": 0,
                       "links": {"first": "http://x?page=1", "last": null}}"#;
        let (_, pagination) = serde_json::from_str::<ListBooksResponse>(body)
            .expect("decode")
            .into_parts();
        let pagination = pagination.expect("pagination");
        assert!(pagination.links.is_empty());
        assert_eq!(pagination.total, 0);
    }

    #[test]
    fn record_response_unwraps_data() {
        let wrapped: BookRecordResponse = serde_json::from_str(
            r#"{"data":{"id":5,"title":"Dune","author":"Herbert","year":1965,"genre":"SF","description":"Spice"}}"#,
        )
        .expect("decode");
        assert_eq!(wrapped.into_book().id, BookId(5));

        let bare: BookRecordResponse =
            serde_json::from_str(r#"{"id":6,"title":"Emma"}"#).expect("decode");
        let book = bare.into_book();
        assert_eq!(book.id, BookId(6));
        assert_eq!(book.author, "");
    }

    #[test]
    fn italian_body_uses_italian_keys() {
        let draft = BookDraft {
            title: "Dune".into(),
            author: "Herbert".into(),
            year: 1965,
            ..BookDraft::blank()
        };
        let body = serde_json::to_value(FieldNames::Italian.draft_body(&draft)).expect("encode");
        assert_eq!(body["titolo"], "Dune");
        assert_eq!(body["autore"], "Herbert");
        assert_eq!(body["anno"], 1965);
        assert!(body.get("title").is_none());
        assert!(body.get("id").is_none());

        let english = serde_json::to_value(FieldNames::English.draft_body(&draft)).expect("encode");
        assert_eq!(english["title"], "Dune");
        assert!(english.get("titolo").is_none());
    }

    #[test]
    fn field_names_parse_from_config_values() {
        assert_eq!("it".parse::<FieldNames>(), Ok(FieldNames::Italian));
        assert_eq!(" EN ".parse::<FieldNames>(), Ok(FieldNames::English));
        assert!("fr".parse::<FieldNames>().is_err());
    }
}
