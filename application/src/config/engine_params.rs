//! Engine parameters: how many agents take part and how long
//! cross-evaluation may take.
//!
//! Stage thresholds and deadlines belong to the domain
//! [`ProtocolConfig`](consensus_domain::ProtocolConfig); these are
//! application concerns.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Agent count limits and evaluation timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Fewer agents than this is rejected
    pub min_agents: usize,
    /// Agents beyond this count are dropped with a warning
    pub max_agents: usize,
    /// Timeout of each single cross-evaluation call
    pub evaluation_timeout: Duration,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            min_agents: 2,
            max_agents: 4,
            evaluation_timeout: Duration::from_secs(120),
        }
    }
}

impl EngineParams {
    pub fn with_min_agents(mut self, min: usize) -> Self {
        self.min_agents = min;
        self
    }

    pub fn with_max_agents(mut self, max: usize) -> Self {
        self.max_agents = max;
        self
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = timeout;
        self
    }
}
