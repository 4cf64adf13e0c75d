//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid answer key payload: {0}")]
    InvalidAnswerPayload(String),

    #[error("Invalid exam payload: {0}")]
    InvalidExamPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel tag {0} is assigned to more than one channel")]
    DuplicateChannelTag(u8),
}

impl DomainError {
    /// Check if this error was caused by a malformed client payload
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidAnswerPayload(_) | DomainError::InvalidExamPayload(_)
        )
    }
}
