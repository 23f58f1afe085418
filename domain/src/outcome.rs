//! Result of a finished discussion.

use crate::consensus::{ConsensusMetrics, EvaluationMatrix};
use crate::discussion::DiscussionId;
use crate::stage::StageType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a discussion ended without consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoConsensusReason {
    /// The final stage did not meet the decision rule
    InsufficientAgreement {
        similarity: f64,
        average_confidence: f64,
    },
    /// Every agent failed in one stage
    AllAgentsFailed { stage: StageType },
    /// The winning answer contained code that failed the static check
    CodeValidationFailed { winner: String, issues: Vec<String> },
}

impl std::fmt::Display for NoConsensusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoConsensusReason::InsufficientAgreement {
                similarity,
                average_confidence,
            } => write!(
                f,
                "insufficient agreement (similarity {:.2}, confidence {:.2})",
                similarity, average_confidence
            ),
            NoConsensusReason::AllAgentsFailed { stage } => {
                write!(f, "all agents failed during {}", stage)
            }
            NoConsensusReason::CodeValidationFailed { winner, issues } => write!(
                f,
                "validation failed for {}'s answer: {}",
                winner,
                issues.join("; ")
            ),
        }
    }
}

/// Consensus or not, with the data that justifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    ConsensusReached {
        consensus: String,
        winner: String,
        evaluations: EvaluationMatrix,
    },
    NoConsensus { reason: NoConsensusReason },
}

/// What a discussion returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionOutcome {
    pub discussion_id: DiscussionId,
    #[serde(flatten)]
    pub resolution: Resolution,
    /// Each agent's last response (agent name -> raw text)
    pub individual_responses: BTreeMap<String, String>,
    /// Metrics of the last evaluated stage
    pub metrics: Option<ConsensusMetrics>,
    /// Metrics of every evaluated stage, in order
    pub stage_metrics: Vec<ConsensusMetrics>,
    /// False when at least one record could not be persisted
    pub durable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_errors: Vec<String>,
}

impl DiscussionOutcome {
    pub fn is_consensus(&self) -> bool {
        matches!(self.resolution, Resolution::ConsensusReached { .. })
    }

    pub fn consensus(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::ConsensusReached { consensus, .. } => Some(consensus),
            Resolution::NoConsensus { .. } => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self.resolution {
            Resolution::ConsensusReached { .. } => "consensus_reached",
            Resolution::NoConsensus { .. } => "no_consensus",
        }
    }
}
