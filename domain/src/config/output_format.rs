//! Output format value object

use serde::{Deserialize, Serialize};

/// How a discussion outcome is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Every stage, every agent response and the resolution
    Full,
    /// Only the consensus answer, or the reason there is none (default)
    #[default]
    Consensus,
    /// Machine-readable outcome
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "consensus" => Ok(Self::Consensus),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}
