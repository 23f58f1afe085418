//! Score extraction from free-form agent text.
//!
//! | Function | Label | Fallback |
//! |----------|-------|----------|
//! | [`extract_confidence`] | `CONFIDENCE:` | 0.0 |
//! | [`extract_evaluation_score`] | `EVALUATION_SCORE:` | mean of rubric category scores, else 0.0 |

use regex::Regex;
use std::sync::LazyLock;

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)CONFIDENCE\**\s*:\s*\**\s*(\d*\.?\d+)").expect("confidence pattern is valid")
});

static EVALUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)EVALUATION_SCORE\**\s*:\s*\**\s*(\d*\.?\d+)")
        .expect("evaluation pattern is valid")
});

static CATEGORY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "correctness",
        "efficiency",
        "error handling",
        "code style",
        "completeness",
    ]
    .iter()
    .map(|name| {
        Regex::new(&format!(r"(?is){}.*?(\d*\.?\d+)", name)).expect("category pattern is valid")
    })
    .collect()
});

/// Map a raw number onto [0, 1]; values above 1 are read as percentages.
pub fn normalize_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scaled = if value > 1.0 { value / 100.0 } else { value };
    scaled.clamp(0.0, 1.0)
}

fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Extract an agent's self-reported confidence.
///
/// Returns 0.0 when no `CONFIDENCE:` label with a number is present.
///
/// # Examples
///
/// ```
/// use consensus_domain::consensus::extract_confidence;
///
/// assert_eq!(extract_confidence("CONFIDENCE: 0.85"), 0.85);
/// assert_eq!(extract_confidence("confidence: 85"), 0.85);
/// assert_eq!(extract_confidence("CONFIDENCE: 150"), 1.0);
/// assert_eq!(extract_confidence("I am quite sure"), 0.0);
/// ```
pub fn extract_confidence(text: &str) -> f64 {
    capture_number(&CONFIDENCE_RE, text)
        .map(normalize_score)
        .unwrap_or(0.0)
}

/// Extract the score one agent assigned to another's answer.
///
/// Looks for `EVALUATION_SCORE:` first; otherwise averages whatever rubric
/// categories carry a number.
pub fn extract_evaluation_score(text: &str) -> f64 {
    if let Some(score) = capture_number(&EVALUATION_RE, text) {
        return normalize_score(score);
    }

    let scores: Vec<f64> = CATEGORY_RES
        .iter()
        .filter_map(|re| capture_number(re, text))
        .map(normalize_score)
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}
