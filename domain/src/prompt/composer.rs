//! Per-agent stage prompts.

use super::template::{CODE_GUIDANCE, CONFIDENCE_GUIDANCE, guidance, render, response_format};
use crate::consensus::ConsensusMetrics;
use crate::consensus::sections::has_code;
use crate::stage::{ProtocolConfig, StageType};
use std::collections::BTreeMap;

const NOT_MEASURED: &str = "not yet measured";

/// Builds the instructions each agent receives in a stage.
///
/// A prompt is assembled from, in order: the original question, the
/// previous stage's responses verbatim, confidence guidance, stage guidance
/// filled with the previous stage's metrics, code guidance when earlier
/// answers contained code, and the stage's required response format.
#[derive(Debug, Clone)]
pub struct PromptComposer<'a> {
    protocol: &'a ProtocolConfig,
}

impl<'a> PromptComposer<'a> {
    pub fn new(protocol: &'a ProtocolConfig) -> Self {
        Self { protocol }
    }

    /// Build one prompt per participant.
    pub fn compose(
        &self,
        stage: StageType,
        original_prompt: &str,
        prior_responses: &BTreeMap<String, String>,
        metrics: Option<&ConsensusMetrics>,
        participants: &[String],
    ) -> BTreeMap<String, String> {
        let body = self.shared_body(stage, original_prompt, prior_responses, metrics);
        participants
            .iter()
            .map(|agent| {
                let prompt = format!(
                    "You are participant \"{}\" in stage {} of {} ({}).\n\n{}",
                    agent,
                    stage.ordinal() + 1,
                    StageType::ALL.len(),
                    stage.display_name(),
                    body
                );
                (agent.clone(), prompt)
            })
            .collect()
    }

    fn shared_body(
        &self,
        stage: StageType,
        original_prompt: &str,
        prior_responses: &BTreeMap<String, String>,
        metrics: Option<&ConsensusMetrics>,
    ) -> String {
        let mut prompt = format!("Original prompt: {}\n\n", original_prompt);

        if !prior_responses.is_empty() {
            prompt.push_str("Previous responses:\n");
            for (agent, response) in prior_responses {
                prompt.push_str(&format!("\n--- {} ---\n{}\n", agent, response));
            }
            prompt.push('\n');
        }

        prompt.push_str(CONFIDENCE_GUIDANCE);
        prompt.push_str("\n\n");
        prompt.push_str(&render(guidance(stage), &self.metric_values(metrics)));
        prompt.push_str("\n\n");

        if prior_responses.values().any(|r| has_code(r)) {
            prompt.push_str(CODE_GUIDANCE);
            prompt.push_str("\n\n");
        }

        prompt.push_str(response_format(stage));
        prompt.push('\n');
        prompt
    }

    fn metric_values(&self, metrics: Option<&ConsensusMetrics>) -> BTreeMap<&'static str, String> {
        let threshold = format!("{:.2}", self.protocol.similarity_threshold());
        match metrics {
            Some(m) => BTreeMap::from([
                ("similarity", format!("{:.2}", m.similarity)),
                ("consensus_threshold", threshold),
                ("avg_confidence", format!("{:.2}", m.average_confidence)),
                ("key_differences", m.differences_summary()),
                ("alignment_areas", m.alignments_summary()),
            ]),
            None => BTreeMap::from([
                ("similarity", NOT_MEASURED.to_string()),
                ("consensus_threshold", threshold),
                ("avg_confidence", NOT_MEASURED.to_string()),
                ("key_differences", NOT_MEASURED.to_string()),
                ("alignment_areas", NOT_MEASURED.to_string()),
            ]),
        }
    }
}
