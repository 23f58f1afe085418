//! Agent port
//!
//! Defines the interface to one discussion participant. Provider adapters
//! (OpenAI, Anthropic, ...) live in the infrastructure layer.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while asking an agent for a response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// A named participant that answers prompts.
///
/// Each call is independent: the agent keeps no conversation state between
/// calls, everything it needs is in the prompt.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name of this agent within a discussion
    fn name(&self) -> &str;

    /// Generate a response to `prompt`
    async fn generate_response(&self, prompt: &str) -> Result<String, AgentError>;
}
