//! Configuration file loading for consensus-engine
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. `CONSENSUS_*` environment variables
//! 3. Project root: `./consensus.toml` or `./.consensus.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/consensus-engine/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    AgentProvider, DEFAULT_SYSTEM_PROMPT, FileAgentConfig, FileConfig, FileEngineConfig,
    FileOutputConfig, FileProtocolConfig, FileStageConfig, FileStorageConfig, check_credentials,
    default_agents, validate_agents,
};
pub use loader::{ConfigError, ConfigLoader};
