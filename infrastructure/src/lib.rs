//! Infrastructure layer for consensus-engine
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: HTTP agents, discussion stores, and
//! configuration file loading.

pub mod agents;
pub mod config;
pub mod persistence;

// Re-export commonly used types
pub use agents::{AgentBuildError, AgentFactory, AgentSettings, AnthropicAgent, OpenAiAgent};
pub use config::{
    AgentProvider, ConfigError, ConfigLoader, FileAgentConfig, FileConfig, FileOutputConfig,
    FileStorageConfig, check_credentials,
};
pub use persistence::{InMemoryDiscussionStore, JsonlDiscussionStore};
