//! Parse errors for domain values arriving as text.

use thiserror::Error;

/// Errors raised when converting external text into domain values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed {kind} identifier: {value}")]
    MalformedId { kind: &'static str, value: String },

    #[error("identifier kind mismatch: expected {expected}, found {found}")]
    WrongIdKind { expected: &'static str, found: String },

    #[error("unknown item status: {0}")]
    UnknownItemStatus(String),

    #[error("unknown pickup request status: {0}")]
    UnknownRequestStatus(String),

    #[error("unknown category kind: {0}")]
    UnknownCategoryKind(String),

    #[error("coordinates out of range: ({latitude}, {longitude})")]
    CoordinatesOutOfRange { latitude: f64, longitude: f64 },
}
