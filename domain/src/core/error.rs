//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid protocol configuration: {0}")]
    InvalidProtocol(String),

    #[error("Stage ordinal {got} out of sequence (expected {expected})")]
    StageOutOfSequence { expected: usize, got: usize },

    #[error("Stage {ordinal} must be {expected}, got {got}")]
    StageTypeMismatch {
        ordinal: usize,
        expected: String,
        got: String,
    },

    #[error("Agent '{0}' already responded in this stage")]
    DuplicateResponse(String),

    #[error("Discussion already completed")]
    AlreadyCompleted,

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
