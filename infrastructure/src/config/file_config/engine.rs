//! Engine configuration from TOML (`[engine]` section)

use consensus_application::EngineParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw engine configuration from TOML
///
/// # Example
///
/// ```toml
/// [engine]
/// min_agents = 2
/// max_agents = 4
/// evaluation_timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    pub min_agents: usize,
    pub max_agents: usize,
    pub evaluation_timeout_secs: u64,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            min_agents: params.min_agents,
            max_agents: params.max_agents,
            evaluation_timeout_secs: params.evaluation_timeout.as_secs(),
        }
    }
}

impl FileEngineConfig {
    pub fn to_engine_params(&self) -> EngineParams {
        EngineParams::default()
            .with_min_agents(self.min_agents)
            .with_max_agents(self.max_agents)
            .with_evaluation_timeout(Duration::from_secs(self.evaluation_timeout_secs))
    }
}
