//! The fixed stage sequence of a discussion.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// One step of the five-stage deliberation sequence.
///
/// The order is closed and fixed: every discussion visits each stage exactly
/// once, in [`StageType::ALL`] order, regardless of how early the agents
/// converge.
///
/// # Example
///
/// ```
/// use consensus_domain::stage::StageType;
///
/// assert_eq!(StageType::first(), StageType::Opening);
/// assert_eq!(StageType::Opening.next(), Some(StageType::Analysis));
/// assert_eq!(StageType::Final.next(), None);
/// assert_eq!(StageType::at(3), Some(StageType::LockIn));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Problem interpretation and initial positions
    Opening,
    /// Format proposals and first solutions
    Analysis,
    /// Agreement on structure, refined solutions
    Refinement,
    /// Solutions in the agreed format only
    LockIn,
    /// The bare answer
    Final,
}

impl StageType {
    /// All stages in protocol order.
    pub const ALL: [StageType; 5] = [
        StageType::Opening,
        StageType::Analysis,
        StageType::Refinement,
        StageType::LockIn,
        StageType::Final,
    ];

    pub fn first() -> Self {
        StageType::Opening
    }

    /// Stage at a 0-based position in the sequence.
    pub fn at(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// 0-based position in the sequence.
    pub fn ordinal(&self) -> usize {
        match self {
            StageType::Opening => 0,
            StageType::Analysis => 1,
            StageType::Refinement => 2,
            StageType::LockIn => 3,
            StageType::Final => 4,
        }
    }

    pub fn next(&self) -> Option<Self> {
        Self::at(self.ordinal() + 1)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StageType::Final)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Opening => "opening",
            StageType::Analysis => "analysis",
            StageType::Refinement => "refinement",
            StageType::LockIn => "lock_in",
            StageType::Final => "final",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StageType::Opening => "Initial Understanding",
            StageType::Analysis => "Opening Analysis",
            StageType::Refinement => "Position Refinement",
            StageType::LockIn => "Consensus Building",
            StageType::Final => "Final Resolution",
        }
    }

    /// Upper-case section labels every response in this stage must carry.
    ///
    /// The same table drives prompt templates, section-aware similarity and
    /// final answer extraction.
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            StageType::Opening => &[
                "UNDERSTANDING",
                "CONSTRAINTS",
                "INITIAL_POSITION",
                "CONFIDENCE",
            ],
            StageType::Analysis => &[
                "FORMAT_PROPOSAL",
                "INITIAL_SOLUTION",
                "RATIONALE",
                "EVIDENCE",
                "CONFIDENCE",
            ],
            StageType::Refinement => &[
                "FORMAT_AGREEMENT",
                "REFINED_SOLUTION",
                "FORMAT_IMPROVEMENTS",
                "EVIDENCE",
                "CONFIDENCE",
            ],
            StageType::LockIn => &["IMPLEMENTATION", "EVIDENCE", "CONFIDENCE"],
            StageType::Final => &["IMPLEMENTATION", "CONFIDENCE"],
        }
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for StageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "opening" => Ok(StageType::Opening),
            "analysis" => Ok(StageType::Analysis),
            "refinement" => Ok(StageType::Refinement),
            "lock_in" | "lockin" => Ok(StageType::LockIn),
            "final" => Ok(StageType::Final),
            other => Err(DomainError::UnknownStage(other.to_string())),
        }
    }
}
