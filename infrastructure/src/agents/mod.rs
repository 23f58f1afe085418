//! HTTP agent adapters
//!
//! Each adapter implements the application's [`Agent`] port on top of one
//! provider API. Request bodies and response parsing are plain functions so
//! they can be tested without a network.
//!
//! [`Agent`]: consensus_application::Agent

mod anthropic;
mod factory;
mod openai;

pub use anthropic::AnthropicAgent;
pub use factory::{AgentBuildError, AgentFactory};
pub use openai::OpenAiAgent;

use consensus_application::AgentError;
use consensus_domain::core::string::truncate;
use std::time::Duration;

/// Maximum length of an error body quoted in an [`AgentError`]
const MAX_ERROR_BODY_LEN: usize = 200;

/// Everything an HTTP agent needs to call its provider
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub api_key: String,
    /// Provider root URL without trailing slash
    pub base_url: String,
    pub timeout: Duration,
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Map a transport error to the port's error type
pub(crate) fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout
    } else if e.is_connect() {
        AgentError::Connection(e.to_string())
    } else {
        AgentError::RequestFailed(e.to_string())
    }
}

/// Error for a non-success HTTP status, quoting a short, redacted body
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> AgentError {
    let lower = body.to_lowercase();
    let detail = if ["api_key", "api-key", "bearer", "sk-"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        "(body redacted)".to_string()
    } else {
        truncate(body.trim(), MAX_ERROR_BODY_LEN)
    };
    AgentError::RequestFailed(format!("{} API error {}: {}", provider, status, detail))
}
