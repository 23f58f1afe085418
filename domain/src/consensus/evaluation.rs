//! Cross-evaluation: agents blindly score each other's final answers.

use super::sections::has_code;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scoring rubric, chosen by whether the answer contains code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rubric {
    Code,
    Prose,
}

impl Rubric {
    pub fn for_response(text: &str) -> Self {
        if has_code(text) {
            Rubric::Code
        } else {
            Rubric::Prose
        }
    }

    pub fn criteria(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Rubric::Code => &[
                ("Correctness", "How well does it solve the problem?"),
                ("Efficiency", "How well does it use resources?"),
                ("Error Handling", "How well does it handle edge cases?"),
                ("Code Style", "How clean and maintainable is the code?"),
                ("Completeness", "How complete is the implementation?"),
            ],
            Rubric::Prose => &[
                ("Accuracy", "Is the information correct?"),
                ("Completeness", "Does it fully answer the question?"),
                ("Clarity", "Is the explanation easy to follow?"),
                ("Usefulness", "Is it practically useful?"),
                ("Overall Quality", "How good is the answer overall?"),
            ],
        }
    }
}

/// Build the one-off scoring prompt for a target's answer.
///
/// The prompt contains the target's response and nothing else from the
/// discussion, so the evaluator cannot see who wrote it.
pub fn evaluation_prompt(target_response: &str) -> String {
    let rubric = Rubric::for_response(target_response);
    let subject = match rubric {
        Rubric::Code => "code solution",
        Rubric::Prose => "response",
    };

    let mut prompt = format!(
        "Evaluate this {}:\n\n---\n{}\n---\n\nRate each category from 0-1:\n",
        subject, target_response
    );
    for (i, (name, question)) in rubric.criteria().iter().enumerate() {
        prompt.push_str(&format!("{}. {} (0-1): {}\n", i + 1, name, question));
    }
    prompt.push_str("\nProvide your final score on its own line as:\nEVALUATION_SCORE: [0-1]\n");
    prompt
}

/// Scores given by each evaluator to each target.
///
/// Failed evaluations are simply never recorded, so they do not drag a
/// target's average down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationMatrix {
    scores: BTreeMap<String, BTreeMap<String, f64>>,
}

impl EvaluationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, evaluator: impl Into<String>, target: impl Into<String>, score: f64) {
        self.scores
            .entry(evaluator.into())
            .or_default()
            .insert(target.into(), score.clamp(0.0, 1.0));
    }

    pub fn get(&self, evaluator: &str, target: &str) -> Option<f64> {
        self.scores.get(evaluator)?.get(target).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.values().all(BTreeMap::is_empty)
    }

    /// evaluator -> target -> score
    pub fn rows(&self) -> &BTreeMap<String, BTreeMap<String, f64>> {
        &self.scores
    }

    /// Mean score a target received, `None` if nobody scored it.
    pub fn average_for(&self, target: &str) -> Option<f64> {
        let received: Vec<f64> = self
            .scores
            .values()
            .filter_map(|row| row.get(target).copied())
            .collect();
        if received.is_empty() {
            None
        } else {
            Some(received.iter().sum::<f64>() / received.len() as f64)
        }
    }

    /// Pick the candidate with the highest average score.
    ///
    /// Unscored candidates count as 0.0; ties go to the alphabetically first
    /// agent name.
    ///
    /// # Example
    ///
    /// ```
    /// use consensus_domain::consensus::EvaluationMatrix;
    ///
    /// let mut matrix = EvaluationMatrix::new();
    /// matrix.record("alpha", "beta", 0.9);
    /// matrix.record("beta", "alpha", 0.9);
    /// let candidates = vec!["beta".to_string(), "alpha".to_string()];
    /// assert_eq!(matrix.winner(&candidates), Some("alpha".to_string()));
    /// ```
    pub fn winner(&self, candidates: &[String]) -> Option<String> {
        let mut ranked: Vec<(&String, f64)> = candidates
            .iter()
            .map(|c| (c, self.average_for(c).unwrap_or(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.first().map(|(name, _)| (*name).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubric_selection() {
        assert_eq!(Rubric::for_response("```\nx\n```"), Rubric::Code);
        assert_eq!(Rubric::for_response("Paris"), Rubric::Prose);
        assert_eq!(
            Rubric::for_response("Quote it with ``` like markdown does"),
            Rubric::Prose
        );
    }

    #[test]
    fn test_code_prompt_lists_code_criteria() {
        let prompt = evaluation_prompt("IMPLEMENTATION:\n```python\nprint(1)\n```");
        assert!(prompt.starts_with("Evaluate this code solution"));
        assert!(prompt.contains("Error Handling (0-1)"));
        assert!(prompt.contains("EVALUATION_SCORE: [0-1]"));
    }

    #[test]
    fn test_prose_prompt_lists_prose_criteria() {
        let prompt = evaluation_prompt("IMPLEMENTATION: Paris");
        assert!(prompt.contains("Accuracy (0-1)"));
        assert!(prompt.contains("Overall Quality (0-1)"));
        assert!(!prompt.contains("Code Style"));
    }

    #[test]
    fn test_averages_ignore_missing_evaluations() {
        let mut matrix = EvaluationMatrix::new();
        matrix.record("a", "b", 0.8);
        matrix.record("c", "b", 0.6);
        matrix.record("b", "a", 0.5);
        assert!((matrix.average_for("b").unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(matrix.average_for("a"), Some(0.5));
        assert_eq!(matrix.average_for("c"), None);
    }

    #[test]
    fn test_winner_highest_average() {
        let mut matrix = EvaluationMatrix::new();
        matrix.record("a", "b", 0.9);
        matrix.record("b", "a", 0.4);
        let candidates = vec!["a".to_string(), "b".to_string()];
        assert_eq!(matrix.winner(&candidates), Some("b".to_string()));
    }

    #[test]
    fn test_winner_tie_breaks_by_name() {
        let matrix = EvaluationMatrix::new();
        let candidates = vec!["zeta".to_string(), "eta".to_string()];
        assert_eq!(matrix.winner(&candidates), Some("eta".to_string()));
        assert_eq!(matrix.winner(&[]), None);
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut matrix = EvaluationMatrix::new();
        matrix.record("a", "b", 7.0);
        assert_eq!(matrix.get("a", "b"), Some(1.0));
    }
}
