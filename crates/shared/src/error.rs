use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    Other,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::Validation,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Other,
        }
    }
}

/// Error body a rejecting backend may send along with a non-success status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    /// Parses a response body, returning the server message only when it is
    /// present and non-blank.
    pub fn message_from_body(body: &str) -> Option<String> {
        serde_json::from_str::<ApiError>(body)
            .ok()
            .and_then(|err| err.message)
            .filter(|message| !message.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes() {
        assert_eq!(ErrorCode::from_status(422), ErrorCode::Validation);
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(503), ErrorCode::Internal);
        assert_eq!(ErrorCode::from_status(418), ErrorCode::Other);
    }

    #[test]
    fn extracts_message_from_validation_body() {
        let body = r#"{"message":"The title field is required.",
                       "errors":{"title":["The title field is required."]}}"#;
        assert_eq!(
            ApiError::message_from_body(body).as_deref(),
            Some("The title field is required.")
        );
    }

    #[test]
    fn ignores_non_json_and_blank_messages() {
        assert_eq!(ApiError::message_from_body("<html>oops</html>"), None);
        assert_eq!(ApiError::message_from_body(r#"{"message":"  "}"#), None);
        assert_eq!(ApiError::message_from_body(""), None);
    }
}
