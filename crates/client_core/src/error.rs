//! Failure taxonomy for calls against the remote book collection.

use shared::error::ErrorCode;
use thiserror::Error;

pub const CONNECTION_FALLBACK: &str = "Connection error; check the server address and retry.";

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("request could not be completed: {0}")]
    NetworkFailure(String),
    #[error("server rejected the request with status {status}{}", rejection_suffix(.message))]
    ServerRejected {
        status: u16,
        code: ErrorCode,
        message: Option<String>,
    },
    #[error("malformed response body: {0}")]
    Decode(String),
    #[error("{0}")]
    Unknown(String),
}

fn rejection_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

impl SyncError {
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        Self::ServerRejected {
            status,
            code: ErrorCode::from_status(status),
            message,
        }
    }

    /// Text shown to the user: the server's own message when it sent one,
    /// otherwise the caller's fallback for the operation.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::ServerRejected {
                message: Some(message),
                ..
            } => message.clone(),
            Self::NetworkFailure(_) => CONNECTION_FALLBACK.to_string(),
            _ => fallback.to_string(),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::ServerRejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            Self::NetworkFailure(err.to_string())
        } else if let Some(status) = err.status() {
            Self::rejected(status.as_u16(), None)
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_surfaced_verbatim() {
        let err = SyncError::rejected(422, Some("The title field is required.".into()));
        assert_eq!(
            err.user_message("Failed to save the book."),
            "The title field is required."
        );
        assert_eq!(err.code(), Some(ErrorCode::Validation));
    }

    #[test]
    fn rejection_without_message_uses_fallback() {
        let err = SyncError::rejected(500, None);
        assert_eq!(err.user_message("Failed to load books."), "Failed to load books.");
        assert_eq!(err.to_string(), "server rejected the request with status 500");
    }

    #[test]
    fn network_failure_uses_connection_message() {
        let err = SyncError::NetworkFailure("connection refused".into());
        assert_eq!(err.user_message("Failed to load books."), CONNECTION_FALLBACK);
        assert_eq!(err.code(), None);
    }
}
