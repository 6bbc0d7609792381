//! Typed terminal commands turned into controller intents.

use anyhow::{anyhow, Result};
use shared::domain::{BookDraft, BookId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Search(String),
    NextPage,
    PrevPage,
    Reload,
    ShowDetails(BookId),
    Edit(BookId),
    New,
    SetField { field: DraftField, value: String },
    Save,
    Cancel,
    Delete(BookId),
    DismissError,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Author,
    Year,
    Genre,
    Description,
}

impl DraftField {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            "year" => Ok(Self::Year),
            "genre" => Ok(Self::Genre),
            "description" | "desc" => Ok(Self::Description),
            other => Err(anyhow!("unknown field '{other}'")),
        }
    }

    pub fn apply(self, draft: &mut BookDraft, value: &str) -> Result<()> {
        match self {
            Self::Title => draft.title = value.to_string(),
            Self::Author => draft.author = value.to_string(),
            Self::Year => {
                draft.year = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("year must be a whole number, got '{value}'"))?
            }
            Self::Genre => draft.genre = value.to_string(),
            Self::Description => draft.description = value.to_string(),
        }
        Ok(())
    }
}

pub const HELP: &str = "\
commands:
  search <text>          filter by title or author (empty clears)
  next | prev | reload   page through the collection
  show <id>              view one book
  new | edit <id>        open the form
  set <field> <value>    fill a form field (title, author, year, genre, description)
  save | cancel          submit or close the form
  delete <id>            delete after confirmation
  dismiss                hide the error banner
  help | quit";

fn parse_id(raw: Option<&str>) -> Result<BookId> {
    let raw = raw.ok_or_else(|| anyhow!("missing book id"))?;
    raw.parse::<i64>()
        .map(BookId)
        .map_err(|_| anyhow!("invalid book id '{raw}'"))
}

pub fn parse_intent(line: &str) -> Result<Intent> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then_some(rest);

    match command.to_ascii_lowercase().as_str() {
        "search" | "s" => Ok(Intent::Search(rest.to_string())),
        "next" | "n" => Ok(Intent::NextPage),
        "prev" | "p" => Ok(Intent::PrevPage),
        "reload" | "r" => Ok(Intent::Reload),
        "show" => Ok(Intent::ShowDetails(parse_id(arg)?)),
        "edit" => Ok(Intent::Edit(parse_id(arg)?)),
        "new" => Ok(Intent::New),
        "set" => {
            let (field, value) = rest
                .split_once(char::is_whitespace)
                .map(|(field, value)| (field, value.trim()))
                .unwrap_or((rest, ""));
            if field.is_empty() {
                return Err(anyhow!("usage: set <field> <value>"));
            }
            Ok(Intent::SetField {
                field: DraftField::parse(field)?,
                value: value.to_string(),
            })
        }
        "save" => Ok(Intent::Save),
        "cancel" | "back" => Ok(Intent::Cancel),
        "delete" | "rm" => Ok(Intent::Delete(parse_id(arg)?)),
        "dismiss" => Ok(Intent::DismissError),
        "help" | "?" | "" => Ok(Intent::Help),
        "quit" | "exit" | "q" => Ok(Intent::Quit),
        other => Err(anyhow!("unknown command '{other}'; type 'help'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_with_spaces() {
        assert_eq!(
            parse_intent("search  jane austen ").expect("parse"),
            Intent::Search("jane austen".into())
        );
        assert_eq!(parse_intent("search").expect("parse"), Intent::Search(String::new()));
    }

    #[test]
    fn parses_id_commands() {
        assert_eq!(parse_intent("show 7").expect("parse"), Intent::ShowDetails(BookId(7)));
        assert_eq!(parse_intent("rm 3").expect("parse"), Intent::Delete(BookId(3)));
        assert!(parse_intent("edit").is_err());
        assert!(parse_intent("delete abc").is_err());
    }

    #[test]
    fn parses_field_assignment() {
        assert_eq!(
            parse_intent("set description A desert planet.").expect("parse"),
            Intent::SetField {
                field: DraftField::Description,
                value: "A desert planet.".into(),
            }
        );
        assert!(parse_intent("set colour red").is_err());
        assert!(parse_intent("set").is_err());
    }

    #[test]
    fn year_field_must_be_numeric() {
        let mut draft = BookDraft::blank();
        DraftField::Year.apply(&mut draft, "1965").expect("apply");
        assert_eq!(draft.year, 1965);
        assert!(DraftField::Year.apply(&mut draft, "mid-sixties").is_err());
        assert_eq!(draft.year, 1965);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_intent("frobnicate").is_err());
        assert_eq!(parse_intent("").expect("parse"), Intent::Help);
    }
}
