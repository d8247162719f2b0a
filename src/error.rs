//! Error types for the catalog client

use serde_json::Value;
use thiserror::Error;

use crate::validation::FieldErrors;

/// MongoDB duplicate-key code, reported for an ISBN that already exists
pub const DUPLICATE_KEY_CODE: i64 = 11000;

/// Main application error type.
///
/// `Rejected` is the structured server rejection (duplicate or invalid ISBN);
/// every other non-2xx response is `Server`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Classify a non-2xx response by its status and raw body.
    ///
    /// A body that is present but not JSON counts as a structured rejection,
    /// as does a JSON body naming a `ValidationError` or a duplicate key.
    pub fn from_response(status: u16, body: &str) -> Self {
        if body.trim().is_empty() {
            return AppError::Server {
                status,
                message: format!("Request failed with status {}", status),
            };
        }

        let json = match serde_json::from_str::<Value>(body) {
            Ok(json) => json,
            Err(_) => {
                return AppError::Rejected {
                    status,
                    message: "Response body could not be parsed".to_string(),
                }
            }
        };

        let message = json
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| json.pointer("/error/message").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        if is_structured_rejection(&json) {
            AppError::Rejected { status, message }
        } else {
            AppError::Server { status, message }
        }
    }

    /// Whether this is the structured (ISBN) rejection
    pub fn is_rejection(&self) -> bool {
        matches!(self, AppError::Rejected { .. })
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Rejected { status, .. } | AppError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn is_structured_rejection(json: &Value) -> bool {
    let name = json
        .pointer("/error/name")
        .or_else(|| json.get("name"))
        .and_then(Value::as_str);
    let code = json.pointer("/error/code").and_then(Value::as_i64);

    name == Some("ValidationError") || code == Some(DUPLICATE_KEY_CODE)
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
