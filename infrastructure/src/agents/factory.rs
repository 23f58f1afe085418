//! Builds [`Agent`] adapters from configuration entries.

use super::{AgentSettings, AnthropicAgent, OpenAiAgent};
use crate::config::{AgentProvider, FileAgentConfig};
use consensus_application::Agent;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// HTTP timeout used when an agent does not set `timeout_secs`
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum AgentBuildError {
    #[error("agent '{agent}': environment variable {var} is not set")]
    MissingApiKey { agent: String, var: String },

    #[error("agent '{agent}': failed to create HTTP client: {reason}")]
    Http { agent: String, reason: String },
}

/// Turns `[[agents]]` entries into ready-to-use agents
pub struct AgentFactory;

impl AgentFactory {
    /// Build one agent per entry, reading API keys through `lookup`
    /// (normally `|var| std::env::var(var).ok()`).
    pub fn build<F>(
        configs: &[FileAgentConfig],
        lookup: F,
    ) -> Result<Vec<Arc<dyn Agent>>, AgentBuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        configs
            .iter()
            .map(|config| Self::build_one(config, &lookup))
            .collect()
    }

    fn build_one<F>(config: &FileAgentConfig, lookup: &F) -> Result<Arc<dyn Agent>, AgentBuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self::settings(config, lookup)?;
        debug!(
            "Building {} agent '{}' with model {}",
            config.provider, settings.name, settings.model
        );

        let http_error = |e: reqwest::Error| AgentBuildError::Http {
            agent: config.name.clone(),
            reason: e.to_string(),
        };
        let agent: Arc<dyn Agent> = match config.provider {
            AgentProvider::OpenAi => Arc::new(OpenAiAgent::new(settings).map_err(http_error)?),
            AgentProvider::Anthropic => {
                Arc::new(AnthropicAgent::new(settings).map_err(http_error)?)
            }
        };
        Ok(agent)
    }

    fn settings<F>(config: &FileAgentConfig, lookup: &F) -> Result<AgentSettings, AgentBuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = config.api_key_env();
        let api_key = lookup(var)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentBuildError::MissingApiKey {
                agent: config.name.clone(),
                var: var.to_string(),
            })?;

        Ok(AgentSettings {
            name: config.name.clone(),
            model: config.model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt().to_string(),
            api_key,
            base_url: config.base_url().to_string(),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}
