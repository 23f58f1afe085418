//! Protocol configuration from TOML (`[protocol]` section)
//!
//! ```toml
//! [protocol]
//! similarity_threshold = 0.75
//!
//! [protocol.stages.final]
//! required_confidence = 0.8
//! max_duration_secs = 240
//! ```

use consensus_domain::{ConfigIssue, ConfigIssueCode, ProtocolConfig, StageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Overrides for one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStageConfig {
    pub required_confidence: Option<f64>,
    pub max_duration_secs: Option<u64>,
}

/// Raw protocol configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProtocolConfig {
    /// Global similarity threshold (default 0.75)
    pub similarity_threshold: Option<f64>,
    /// Per-stage overrides keyed by stage name (`opening`, ..., `final`)
    pub stages: BTreeMap<String, FileStageConfig>,
}

impl FileProtocolConfig {
    /// Build the protocol, falling back to defaults for anything invalid.
    pub fn to_protocol_config(&self) -> (ProtocolConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut protocol = ProtocolConfig::default();

        if let Some(threshold) = self.similarity_threshold {
            protocol = protocol.with_similarity_threshold(threshold);
        }

        for (name, overrides) in &self.stages {
            let stage = match name.parse::<StageType>() {
                Ok(stage) => stage,
                Err(_) => {
                    issues.push(ConfigIssue::warning(
                        ConfigIssueCode::InvalidProtocol,
                        format!(
                            "protocol.stages.{}: unknown stage, expected one of {}",
                            name,
                            StageType::ALL.map(|s| s.as_str()).join(", ")
                        ),
                    ));
                    continue;
                }
            };
            if let Some(value) = overrides.required_confidence {
                protocol = protocol.with_required_confidence(stage, value);
            }
            if let Some(secs) = overrides.max_duration_secs {
                protocol = protocol.with_max_duration(stage, Duration::from_secs(secs));
            }
        }

        if let Err(e) = protocol.validate() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidProtocol,
                format!("protocol: {}", e),
            ));
            return (ProtocolConfig::default(), issues);
        }

        (protocol, issues)
    }
}
