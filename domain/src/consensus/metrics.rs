//! Per-stage convergence metrics and the pass/fail decision rule.

use super::confidence::extract_confidence;
use super::sections::missing_sections;
use super::similarity::{SimilarityReport, SimilarityScorer};
use crate::stage::{StageSettings, StageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived (never persisted) metrics of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    pub stage: StageType,
    pub similarity: f64,
    pub average_confidence: f64,
    pub required_confidence: f64,
    pub similarity_threshold: f64,
    pub responders: usize,
    pub confidences: BTreeMap<String, f64>,
    pub breakdown: SimilarityReport,
    pub key_differences: Vec<String>,
    pub alignment_areas: Vec<String>,
    pub passed: bool,
}

/// The decision rule.
///
/// A stage passes iff at least one agent answered, similarity reaches the
/// global threshold and average confidence reaches the stage requirement.
pub fn stage_passes(
    responders: usize,
    similarity: f64,
    average_confidence: f64,
    threshold: f64,
    required_confidence: f64,
) -> bool {
    responders > 0 && similarity >= threshold && average_confidence >= required_confidence
}

impl ConsensusMetrics {
    /// Score a stage's responses (agent name -> raw text).
    ///
    /// # Example
    ///
    /// ```
    /// use consensus_domain::consensus::ConsensusMetrics;
    /// use consensus_domain::stage::{ProtocolConfig, StageType};
    /// use std::collections::BTreeMap;
    ///
    /// let protocol = ProtocolConfig::default();
    /// let mut responses = BTreeMap::new();
    /// responses.insert("a".to_string(), "IMPLEMENTATION: 42\nCONFIDENCE: 0.9".to_string());
    /// responses.insert("b".to_string(), "IMPLEMENTATION: 42\nCONFIDENCE: 0.8".to_string());
    ///
    /// let metrics = ConsensusMetrics::evaluate(
    ///     protocol.stage(StageType::Final),
    ///     protocol.similarity_threshold(),
    ///     &responses,
    /// );
    /// assert!(metrics.passed);
    /// ```
    pub fn evaluate(
        settings: &StageSettings,
        threshold: f64,
        responses: &BTreeMap<String, String>,
    ) -> Self {
        let breakdown = SimilarityScorer::new().analyze(responses);
        let confidences: BTreeMap<String, f64> = responses
            .iter()
            .map(|(agent, text)| (agent.clone(), extract_confidence(text)))
            .collect();
        let average_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.values().sum::<f64>() / confidences.len() as f64
        };

        let (key_differences, alignment_areas) =
            qualitative_notes(settings, threshold, responses, &breakdown);

        let responders = responses.len();
        let similarity = breakdown.score;
        Self {
            stage: settings.stage,
            similarity,
            average_confidence,
            required_confidence: settings.required_confidence,
            similarity_threshold: threshold,
            responders,
            confidences,
            breakdown,
            key_differences,
            alignment_areas,
            passed: stage_passes(
                responders,
                similarity,
                average_confidence,
                threshold,
                settings.required_confidence,
            ),
        }
    }

    /// Key differences as a single line for prompt interpolation.
    pub fn differences_summary(&self) -> String {
        join_or_none(&self.key_differences)
    }

    /// Alignment areas as a single line for prompt interpolation.
    pub fn alignments_summary(&self) -> String {
        join_or_none(&self.alignment_areas)
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none identified".to_string()
    } else {
        items.join("; ")
    }
}

fn qualitative_notes(
    settings: &StageSettings,
    threshold: f64,
    responses: &BTreeMap<String, String>,
    breakdown: &SimilarityReport,
) -> (Vec<String>, Vec<String>) {
    let mut differences = Vec::new();
    let mut alignments = Vec::new();

    for (section, score) in &breakdown.section_scores {
        if *score >= threshold {
            alignments.push(format!("{} ({:.2})", section, score));
        } else {
            differences.push(format!("{} diverges ({:.2})", section, score));
        }
    }
    for section in &breakdown.partial_sections {
        differences.push(format!("{} not given by every agent", section));
    }
    for (agent, text) in responses {
        let missing = missing_sections(text, settings.required_sections());
        if !missing.is_empty() {
            differences.push(format!("{} omitted {}", agent, missing.join(", ")));
        }
    }
    if let Some(code) = breakdown.code {
        if code >= threshold {
            alignments.push(format!("implementations match ({:.2})", code));
        } else {
            differences.push(format!("implementations diverge ({:.2})", code));
        }
    }
    if let Some(evidence) = breakdown.evidence {
        if evidence >= threshold {
            alignments.push(format!("shared evidence ({:.2})", evidence));
        } else {
            differences.push(format!("different evidence cited ({:.2})", evidence));
        }
    }

    (differences, alignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ProtocolConfig;

    fn responses(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn evaluate(stage: StageType, r: &BTreeMap<String, String>) -> ConsensusMetrics {
        let protocol = ProtocolConfig::default();
        ConsensusMetrics::evaluate(protocol.stage(stage), protocol.similarity_threshold(), r)
    }

    #[test]
    fn test_decision_rule() {
        assert!(stage_passes(2, 0.8, 0.8, 0.75, 0.75));
        assert!(stage_passes(2, 0.75, 0.75, 0.75, 0.75));
        assert!(!stage_passes(2, 0.74, 0.9, 0.75, 0.5));
        assert!(!stage_passes(2, 0.9, 0.49, 0.75, 0.5));
        assert!(!stage_passes(0, 1.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn test_single_response_passes_on_similarity_but_may_fail_confidence() {
        let r = responses(&[("a", "IMPLEMENTATION: x\nCONFIDENCE: 0.3")]);
        let metrics = evaluate(StageType::Final, &r);
        assert_eq!(metrics.similarity, 1.0);
        assert!(!metrics.passed);

        let opening = evaluate(StageType::Opening, &r);
        assert!(opening.passed);
    }

    #[test]
    fn test_no_responses_fail() {
        let metrics = evaluate(StageType::Opening, &BTreeMap::new());
        assert_eq!(metrics.responders, 0);
        assert_eq!(metrics.similarity, 0.0);
        assert!(!metrics.passed);
    }

    #[test]
    fn test_average_confidence() {
        let r = responses(&[
            ("a", "IMPLEMENTATION: x\nCONFIDENCE: 0.9"),
            ("b", "IMPLEMENTATION: x\nCONFIDENCE: 70"),
        ]);
        let metrics = evaluate(StageType::Final, &r);
        assert!((metrics.average_confidence - 0.8).abs() < 1e-9);
        assert_eq!(metrics.confidences["b"], 0.7);
    }

    #[test]
    fn test_notes_report_missing_sections() {
        let r = responses(&[
            ("a", "IMPLEMENTATION: x\nEVIDENCE: docs\nCONFIDENCE: 0.9"),
            ("b", "IMPLEMENTATION: x\nCONFIDENCE: 0.9"),
        ]);
        let metrics = evaluate(StageType::LockIn, &r);
        assert!(
            metrics
                .key_differences
                .iter()
                .any(|d| d == "b omitted EVIDENCE")
        );
        assert!(
            metrics
                .key_differences
                .iter()
                .any(|d| d.starts_with("EVIDENCE not given"))
        );
        assert!(metrics.differences_summary().contains("b omitted EVIDENCE"));
    }

    #[test]
    fn test_empty_notes_summary() {
        let text = "UNDERSTANDING: same\nCONSTRAINTS: same\nINITIAL_POSITION: same\nCONFIDENCE: 0.5";
        let metrics = evaluate(StageType::Opening, &responses(&[("a", text), ("b", text)]));
        assert_eq!(metrics.differences_summary(), "none identified");
    }
}
