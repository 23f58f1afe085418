//! Stage templates
//!
//! Placeholders use `{name}` syntax and are filled by [`render`].

use crate::stage::StageType;
use std::collections::BTreeMap;

/// How agents should calibrate their self-reported confidence.
pub const CONFIDENCE_GUIDANCE: &str = r#"Confidence guidelines (0.0-1.0):
- Base your confidence on how closely your position matches the other participants
- Account for shared evidence and shared reasoning
- Confidence should reflect how likely the group is to agree

Consensus is measured by:
- Text similarity between responses
- Code similarity (for programming solutions)
- Shared evidence and citations

Scores above 0.8 claim strong alignment, 0.5-0.7 signal that agreement is within reach,
and scores below 0.5 indicate significant differences."#;

/// Extra instructions when earlier responses contained code.
pub const CODE_GUIDANCE: &str = r#"For code solutions:
1. Match the structure and organisation of the other solutions
2. Use identical variable names, function signatures, error handling and comment style
3. Produce the same output format
4. Follow the same patterns"#;

/// Stage guidance shown alongside the live metrics.
pub fn guidance(stage: StageType) -> &'static str {
    match stage {
        StageType::Opening => {
            r#"Current metrics:
1. Similarity: {similarity}
2. Average confidence: {avg_confidence}
3. Consensus requires {consensus_threshold} similarity

To move towards consensus:
- Interpret the problem consistently
- Identify the same key constraints
- Align initial positions where possible"#
        }
        StageType::Analysis => {
            r#"Progress metrics:
1. Similarity: {similarity}
2. Required similarity: {consensus_threshold}
3. Group confidence: {avg_confidence}
4. Main differences: {key_differences}

Focus on:
- Proposing a clear solution format
- Building on the format suggestions of others
- Giving a structured initial solution"#
        }
        StageType::Refinement => {
            r#"Current metrics:
1. Similarity: {similarity}
2. Consensus target: {consensus_threshold}
3. Areas of alignment: {alignment_areas}
4. Outstanding differences: {key_differences}

Focus on:
- Agreeing on the common format elements
- Adapting your solution to the shared structure
- Proposing final format refinements"#
        }
        StageType::LockIn => {
            r#"Consensus status:
1. Similarity: {similarity}
2. Target threshold: {consensus_threshold}
3. Group confidence: {avg_confidence}
4. Key alignments: {alignment_areas}

Requirements:
- Use exactly the agreed format
- Do not modify the format
- Include every required section
- Mention format concerns only in your confidence explanation"#
        }
        StageType::Final => {
            r#"Final metrics:
1. Similarity: {similarity}
2. Required for consensus: {consensus_threshold}
3. Collective confidence: {avg_confidence}

Final requirements:
- Provide ONLY the solution
- Use the exact agreed format
- No meta-discussion or explanations
- Answer the original question"#
        }
    }
}

/// Required response layout for a stage.
pub fn response_format(stage: StageType) -> &'static str {
    match stage {
        StageType::Opening => {
            r#"Format your response:
UNDERSTANDING: [your interpretation of the problem]
CONSTRAINTS: [key limitations]
INITIAL_POSITION: [your starting stance]
CONFIDENCE: [0.0-1.0 score and why]"#
        }
        StageType::Analysis => {
            r#"Review the initial responses and propose a solution format:

FORMAT_PROPOSAL: [2-3 sections any solution should include, and why]
INITIAL_SOLUTION: [your solution using the proposed format]
RATIONALE: [why this format suits the problem]
EVIDENCE: [comma-separated sources, facts or examples you rely on]
CONFIDENCE: [0.0-1.0 with explanation]"#
        }
        StageType::Refinement => {
            r#"Review the format proposals from the previous stage.

FORMAT_AGREEMENT: [which proposed format elements you agree with, and refinements]
REFINED_SOLUTION: [your solution using the most commonly agreed sections]
FORMAT_IMPROVEMENTS: [any final format adjustments]
EVIDENCE: [comma-separated sources, facts or examples you rely on]
CONFIDENCE: [0.0-1.0 with explanation]"#
        }
        StageType::LockIn => {
            r#"Use the structure agreed in the previous stages, with no additions or modifications:

IMPLEMENTATION: [your solution in the agreed format]
EVIDENCE: [comma-separated sources, facts or examples you rely on]
CONFIDENCE: [0.0-1.0 covering both solution and format]"#
        }
        StageType::Final => {
            r#"Provide ONLY the solution to the original prompt in the agreed format.
Do not write anything outside the two sections below. No meta-discussion, no explanations.

IMPLEMENTATION: [the solution]
CONFIDENCE: [0.0-1.0 number only]"#
        }
    }
}

/// Replace `{name}` placeholders with values; unknown placeholders are kept.
///
/// # Example
///
/// ```
/// use consensus_domain::prompt::template::render;
/// use std::collections::BTreeMap;
///
/// let values = BTreeMap::from([("similarity", "0.80".to_string())]);
/// assert_eq!(render("at {similarity} of {target}", &values), "at 0.80 of {target}");
/// ```
pub fn render(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if values.contains_key(&after[..end]) => {
                out.push_str(&values[&after[..end]]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let values = BTreeMap::from([("a", "1".to_string()), ("b", "2".to_string())]);
        assert_eq!(render("{a}+{a}={b}", &values), "1+1=2");
    }

    #[test]
    fn test_render_keeps_braces_in_code() {
        let values = BTreeMap::from([("a", "1".to_string())]);
        assert_eq!(render("fn f() { {a} }", &values), "fn f() { 1 }");
    }

    #[test]
    fn test_formats_name_required_sections() {
        for stage in StageType::ALL {
            let format = response_format(stage);
            for section in stage.required_sections() {
                assert!(
                    format.contains(&format!("{}:", section)),
                    "{} format lacks {}",
                    stage.as_str(),
                    section
                );
            }
        }
    }

    #[test]
    fn test_every_guidance_reports_similarity() {
        for stage in StageType::ALL {
            assert!(guidance(stage).contains("{similarity}"));
            assert!(guidance(stage).contains("{consensus_threshold}"));
        }
    }
}
