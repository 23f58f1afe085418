//! Application layer for consensus-engine
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::EngineParams;
pub use ports::{
    agent::{Agent, AgentError},
    discussion_store::{DiscussionStore, StoreError},
    progress::{NoProgress, ProgressEvent, ProgressSink},
};
pub use use_cases::registry::DiscussionRegistry;
pub use use_cases::run_discussion::{RunDiscussionError, RunDiscussionUseCase};
