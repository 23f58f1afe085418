//! Protocol configuration: the static per-stage settings and the global
//! similarity threshold.
//!
//! A [`ProtocolConfig`] is built once (defaults, then optional overrides from
//! configuration files), validated, and then shared read-only by the
//! orchestrator, the prompt composer and the decision rule.

use super::stage_type::StageType;
use crate::core::error::DomainError;
use std::time::Duration;

/// Default similarity a stage must reach to count as converged.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Static configuration attached to one [`StageType`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub stage: StageType,
    /// Minimum average self-reported confidence for the stage to pass
    pub required_confidence: f64,
    /// Hard deadline for collecting agent responses
    pub max_duration: Duration,
    /// Participants the stage expects (informational precondition)
    pub min_participants: usize,
    /// Whether responses are expected to cite an `EVIDENCE` section
    pub evidence_required: bool,
}

impl StageSettings {
    /// Built-in settings for a stage.
    pub fn defaults_for(stage: StageType) -> Self {
        let (required_confidence, secs, evidence_required) = match stage {
            StageType::Opening => (0.0, 300, false),
            StageType::Analysis => (0.5, 600, true),
            StageType::Refinement => (0.6, 600, true),
            StageType::LockIn => (0.7, 600, true),
            StageType::Final => (0.75, 300, true),
        };
        Self {
            stage,
            required_confidence,
            max_duration: Duration::from_secs(secs),
            min_participants: 2,
            evidence_required,
        }
    }

    pub fn name(&self) -> &'static str {
        self.stage.display_name()
    }

    pub fn required_sections(&self) -> &'static [&'static str] {
        self.stage.required_sections()
    }
}

/// Immutable protocol parameters for a discussion.
///
/// # Example
///
/// ```
/// use consensus_domain::stage::{ProtocolConfig, StageType};
///
/// let protocol = ProtocolConfig::default();
/// assert_eq!(protocol.similarity_threshold(), 0.75);
/// assert_eq!(protocol.stage(StageType::LockIn).required_confidence, 0.7);
/// assert!(protocol.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    similarity_threshold: f64,
    stages: [StageSettings; 5],
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            stages: StageType::ALL.map(StageSettings::defaults_for),
        }
    }
}

impl ProtocolConfig {
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn stage(&self, stage: StageType) -> &StageSettings {
        &self.stages[stage.ordinal()]
    }

    /// Settings for every stage in protocol order.
    pub fn stages(&self) -> &[StageSettings] {
        &self.stages
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_required_confidence(mut self, stage: StageType, value: f64) -> Self {
        self.stages[stage.ordinal()].required_confidence = value;
        self
    }

    pub fn with_max_duration(mut self, stage: StageType, duration: Duration) -> Self {
        self.stages[stage.ordinal()].max_duration = duration;
        self
    }

    /// Check that thresholds are probabilities, required confidence never
    /// decreases along the sequence, and every stage has a deadline.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DomainError::InvalidProtocol(format!(
                "similarity threshold {} outside [0, 1]",
                self.similarity_threshold
            )));
        }

        let mut previous = 0.0;
        for settings in &self.stages {
            let value = settings.required_confidence;
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidProtocol(format!(
                    "required confidence {} for {} outside [0, 1]",
                    value, settings.stage
                )));
            }
            if value < previous {
                return Err(DomainError::InvalidProtocol(format!(
                    "required confidence for {} ({}) is lower than the previous stage ({})",
                    settings.stage, value, previous
                )));
            }
            if settings.max_duration.is_zero() {
                return Err(DomainError::InvalidProtocol(format!(
                    "max duration for {} must be non-zero",
                    settings.stage
                )));
            }
            previous = value;
        }
        Ok(())
    }
}
