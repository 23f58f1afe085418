//! Discussion store port
//!
//! Append-only persistence of discussions, stages and responses.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use consensus_domain::{Discussion, DiscussionId, DiscussionTranscript, Response, Stage};
use thiserror::Error;

/// Errors that can occur in a discussion store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Discussion not found: {0}")]
    NotFound(DiscussionId),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Durable record of discussions.
///
/// Records are written once; the only later write is
/// [`complete_discussion`](DiscussionStore::complete_discussion), which sets
/// the terminal fields of a discussion that is not yet complete.
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// Insert a newly created discussion
    async fn insert_discussion(&self, discussion: &Discussion) -> Result<(), StoreError>;

    /// Append a stage to its discussion
    async fn append_stage(&self, stage: &Stage) -> Result<(), StoreError>;

    /// Append a response to its stage
    async fn append_response(&self, response: &Response) -> Result<(), StoreError>;

    /// Store the terminal fields of `discussion`
    async fn complete_discussion(&self, discussion: &Discussion) -> Result<(), StoreError>;

    /// Load a discussion with all of its stages and responses
    async fn load_discussion(&self, id: DiscussionId) -> Result<DiscussionTranscript, StoreError>;

    /// List stored discussions, oldest first
    async fn list_discussions(&self) -> Result<Vec<Discussion>, StoreError>;
}
