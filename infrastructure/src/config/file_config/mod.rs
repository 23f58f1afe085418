//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod agent;
mod engine;
mod output;
mod protocol;
mod storage;

pub use agent::{
    AgentProvider, DEFAULT_SYSTEM_PROMPT, FileAgentConfig, check_credentials, default_agents,
    validate_agents,
};
pub use engine::FileEngineConfig;
pub use output::FileOutputConfig;
pub use protocol::{FileProtocolConfig, FileStageConfig};
pub use storage::FileStorageConfig;

use consensus_domain::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Stage thresholds and deadlines
    pub protocol: FileProtocolConfig,
    /// Participant limits and evaluation timeout
    pub engine: FileEngineConfig,
    /// Discussion participants; the built-in pair is used when empty
    pub agents: Vec<FileAgentConfig>,
    /// Where discussions are recorded
    pub storage: FileStorageConfig,
    /// Output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Configured agents, or the built-in OpenAI + Anthropic pair
    pub fn effective_agents(&self) -> Vec<FileAgentConfig> {
        if self.agents.is_empty() {
            default_agents()
        } else {
            self.agents.clone()
        }
    }

    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Credentials are not checked here, see [`check_credentials`].
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.protocol.to_protocol_config().1);
        issues.extend(validate_agents(
            &self.effective_agents(),
            self.engine.min_agents,
            self.engine.max_agents,
        ));
        issues
    }
}
