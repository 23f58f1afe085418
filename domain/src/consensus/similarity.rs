//! Aggregate convergence score for one stage's responses.
//!
//! ```text
//! base      = mean over common sections of mean pairwise TF-IDF cosine
//!             (whole text when no section is shared; sequence ratio of the
//!             two longest texts when vectorisation is degenerate)
//! +code     = 0.3 * base + 0.7 * code          (any response has code)
//! +evidence = 0.7 * current + 0.3 * evidence   (any response cites EVIDENCE)
//! ```

use super::code;
use super::sections::{self, CONFIDENCE};
use super::sequence;
use super::tfidf;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const CODE_BLEND: f64 = 0.7;
const EVIDENCE_BLEND: f64 = 0.3;

/// How the base text score was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    /// Fewer than two responses
    Trivial,
    /// Normalised texts are identical
    Identical,
    /// TF-IDF cosine per shared section
    Sections,
    /// TF-IDF cosine over whole responses
    WholeText,
    /// Character sequence ratio (vectorisation was degenerate)
    SequenceFallback,
}

/// Breakdown of a similarity computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    /// Final blended score in [0, 1]
    pub score: f64,
    /// Text score before code and evidence blending
    pub base: f64,
    /// Code similarity, when any response contains code
    pub code: Option<f64>,
    /// Evidence Jaccard, when any response cites evidence
    pub evidence: Option<f64>,
    /// Mean pairwise score of each section present in every response
    pub section_scores: BTreeMap<String, f64>,
    /// Sections present in some but not all responses
    pub partial_sections: Vec<String>,
    pub method: SimilarityMethod,
}

impl SimilarityReport {
    fn trivial(score: f64) -> Self {
        Self {
            score,
            base: score,
            code: None,
            evidence: None,
            section_scores: BTreeMap::new(),
            partial_sections: Vec::new(),
            method: SimilarityMethod::Trivial,
        }
    }
}

/// Stateless scorer over a map of agent name to response text.
///
/// Results never depend on map order.
///
/// # Example
///
/// ```
/// use consensus_domain::consensus::SimilarityScorer;
/// use std::collections::BTreeMap;
///
/// let mut responses = BTreeMap::new();
/// responses.insert("alpha".to_string(), "IMPLEMENTATION: Paris".to_string());
/// responses.insert("beta".to_string(), "IMPLEMENTATION: Paris".to_string());
/// assert_eq!(SimilarityScorer::new().score(&responses), 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, responses: &BTreeMap<String, String>) -> f64 {
        self.analyze(responses).score
    }

    pub fn analyze(&self, responses: &BTreeMap<String, String>) -> SimilarityReport {
        match responses.len() {
            0 => return SimilarityReport::trivial(0.0),
            1 => return SimilarityReport::trivial(1.0),
            _ => {}
        }
        let texts: Vec<&str> = responses.values().map(String::as_str).collect();

        let (base, method, section_scores, partial_sections) = base_similarity(&texts);
        let mut score = base;

        let blocks: Vec<Vec<String>> = texts
            .iter()
            .map(|t| {
                sections::extract_code_blocks(t)
                    .iter()
                    .map(|b| code::normalize_code(b))
                    .collect()
            })
            .collect();
        let code = blocks
            .iter()
            .any(|b| !b.is_empty())
            .then(|| code::code_similarity(&blocks));
        if let Some(code_score) = code {
            score += CODE_BLEND * (code_score - score);
        }

        let evidence = evidence_similarity(&texts);
        if let Some(evidence_score) = evidence {
            score += EVIDENCE_BLEND * (evidence_score - score);
        }

        SimilarityReport {
            score: score.clamp(0.0, 1.0),
            base,
            code,
            evidence,
            section_scores,
            partial_sections,
            method,
        }
    }
}

fn base_similarity(
    texts: &[&str],
) -> (f64, SimilarityMethod, BTreeMap<String, f64>, Vec<String>) {
    let normalized: Vec<String> = texts.iter().map(|t| sections::normalize_text(t)).collect();
    if normalized.windows(2).all(|w| w[0] == w[1]) {
        return (1.0, SimilarityMethod::Identical, BTreeMap::new(), Vec::new());
    }

    let parsed: Vec<BTreeMap<String, String>> =
        texts.iter().map(|t| sections::parse_sections(t)).collect();
    let all_labels: BTreeSet<&String> = parsed
        .iter()
        .flat_map(|s| s.keys())
        .filter(|label| label.as_str() != CONFIDENCE)
        .collect();

    let mut section_scores = BTreeMap::new();
    let mut partial_sections = Vec::new();
    let mut degenerate = false;
    for label in all_labels {
        let contents: Vec<String> = parsed
            .iter()
            .filter_map(|s| s.get(label))
            .map(|c| sections::normalize_text(c))
            .collect();
        if contents.len() < parsed.len() {
            partial_sections.push(label.clone());
            continue;
        }
        // code-only sections are scored by the code blend
        if contents.iter().all(String::is_empty) {
            continue;
        }
        let docs: Vec<&str> = contents.iter().map(String::as_str).collect();
        match tfidf::average_pairwise_similarity(&docs) {
            Some(score) => {
                section_scores.insert(label.clone(), score);
            }
            None => degenerate = true,
        }
    }

    if !degenerate && !section_scores.is_empty() {
        let mean = section_scores.values().sum::<f64>() / section_scores.len() as f64;
        return (mean, SimilarityMethod::Sections, section_scores, partial_sections);
    }

    if !degenerate {
        let docs: Vec<&str> = normalized.iter().map(String::as_str).collect();
        if let Some(score) = tfidf::average_pairwise_similarity(&docs) {
            return (score, SimilarityMethod::WholeText, section_scores, partial_sections);
        }
    }

    (
        longest_pair_ratio(&normalized),
        SimilarityMethod::SequenceFallback,
        section_scores,
        partial_sections,
    )
}

/// Sequence ratio between the two longest normalised texts.
fn longest_pair_ratio(normalized: &[String]) -> f64 {
    let mut ordered: Vec<&String> = normalized.iter().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    match ordered.as_slice() {
        [first, second, ..] => sequence::ratio(first, second),
        _ => 1.0,
    }
}

/// Mean pairwise Jaccard of evidence items.
///
/// `None` when no response carries a non-empty `EVIDENCE` section; a
/// response without evidence contributes an empty set.
fn evidence_similarity(texts: &[&str]) -> Option<f64> {
    let sets: Vec<BTreeSet<String>> = texts
        .iter()
        .map(|t| sections::extract_evidence(t).unwrap_or_default())
        .collect();
    if sets.iter().all(BTreeSet::is_empty) {
        return None;
    }

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            total += code::jaccard(&sets[i], &sets[j]);
            pairs += 1;
        }
    }
    Some(total / pairs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_identical_responses_score_one() {
        let text = "UNDERSTANDING: reverse a list\nCONSTRAINTS: in place\nCONFIDENCE: 0.8";
        let r = responses(&[("x", text), ("y", text)]);
        let report = SimilarityScorer::new().analyze(&r);
        assert_eq!(report.score, 1.0);
        assert_eq!(report.method, SimilarityMethod::Identical);
    }

    #[test]
    fn test_identical_code_responses_score_one() {
        let text = "IMPLEMENTATION:\n```python\ndef f(x):\n    return x\n```\nEVIDENCE: docs\nCONFIDENCE: 0.9";
        let r = responses(&[("x", text), ("y", text)]);
        assert_eq!(SimilarityScorer::new().score(&r), 1.0);
    }

    #[test]
    fn test_inline_backticks_are_not_blended_as_code() {
        let text = "IMPLEMENTATION: Wrap snippets in triple backticks (```) so they render\nCONFIDENCE: 0.9";
        let report = SimilarityScorer::new().analyze(&responses(&[("x", text), ("y", text)]));
        assert_eq!(report.code, None);
        assert_eq!(report.score, 1.0);
    }

    #[test]
    fn test_single_and_empty() {
        let scorer = SimilarityScorer::new();
        assert_eq!(scorer.score(&responses(&[("x", "anything")])), 1.0);
        assert_eq!(scorer.score(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_order_independent() {
        let a = "UNDERSTANDING: sort numbers quickly\nCONSTRAINTS: memory bound\nCONFIDENCE: 0.6";
        let b = "UNDERSTANDING: sort the numbers\nCONSTRAINTS: time bound\nCONFIDENCE: 0.7";
        let c = "UNDERSTANDING: numbers need sorting\nCONSTRAINTS: memory and time\nCONFIDENCE: 0.5";
        let scorer = SimilarityScorer::new();
        let first = scorer.score(&responses(&[("a", a), ("b", b), ("c", c)]));
        let second = scorer.score(&responses(&[("a", c), ("b", a), ("c", b)]));
        assert!((first - second).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_section_is_ignored() {
        let a = "INITIAL_POSITION: use quicksort\nCONFIDENCE: 0.9";
        let b = "INITIAL_POSITION: use quicksort\nCONFIDENCE: 0.1";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        assert!((report.score - 1.0).abs() < 1e-9);
        assert!(!report.section_scores.contains_key("CONFIDENCE"));
    }

    #[test]
    fn test_partial_sections_reported() {
        let a = "INITIAL_POSITION: use quicksort\nRATIONALE: fast average case";
        let b = "INITIAL_POSITION: use mergesort";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        assert_eq!(report.partial_sections, vec!["RATIONALE".to_string()]);
        assert!(report.section_scores.contains_key("INITIAL_POSITION"));
    }

    #[test]
    fn test_whole_text_when_no_sections() {
        let report = SimilarityScorer::new().analyze(&responses(&[
            ("a", "binary search halves the range"),
            ("b", "binary search splits the range"),
        ]));
        assert_eq!(report.method, SimilarityMethod::WholeText);
        assert!(report.score > 0.0 && report.score < 1.0);
    }

    #[test]
    fn test_degenerate_falls_back_to_sequence() {
        let report =
            SimilarityScorer::new().analyze(&responses(&[("a", "it is"), ("b", "it was")]));
        assert_eq!(report.method, SimilarityMethod::SequenceFallback);
        assert!(report.score > 0.0 && report.score < 1.0);
    }

    #[test]
    fn test_code_blend_weighting() {
        // Same signature, different variable names
        let a = "IMPLEMENTATION:\n```python\ndef total(items):\n    acc = 0\n    for item in items:\n        acc += item\n    return acc\n```";
        let b = "IMPLEMENTATION:\n```python\ndef total(items):\n    s = 0\n    for x in items:\n        s += x\n    return s\n```";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        let code = report.code.unwrap();
        assert!(code > 0.0 && code < 1.0);
        assert!(report.evidence.is_none());
        let expected = 0.3 * report.base + 0.7 * code;
        assert!((report.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_evidence_blend_weighting() {
        let a = "RATIONALE: caching helps\nEVIDENCE: benchmark, rfc 9111";
        let b = "RATIONALE: caching helps a lot\nEVIDENCE: benchmark";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        assert_eq!(report.evidence, Some(0.5));
        let expected = 0.7 * report.base + 0.3 * 0.5;
        assert!((report.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_code_then_evidence_blend() {
        let a = "IMPLEMENTATION:\n```python\ndef total(items):\n    acc = 0\n    for item in items:\n        acc += item\n    return acc\n```\nEVIDENCE: python docs, pep 8";
        let b = "IMPLEMENTATION:\n```python\ndef total(items):\n    s = 0\n    for x in items:\n        s += x\n    return s\n```\nEVIDENCE: python docs";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        let code = report.code.unwrap();
        assert_eq!(report.evidence, Some(0.5));
        // evidence is blended into the already code-blended score
        let with_code = 0.3 * report.base + 0.7 * code;
        let expected = 0.7 * with_code + 0.3 * 0.5;
        assert!((report.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_response_without_code_drags_score_down() {
        let a = "IMPLEMENTATION:\n```\nprint(1)\n```";
        let b = "IMPLEMENTATION: print one";
        let report = SimilarityScorer::new().analyze(&responses(&[("a", a), ("b", b)]));
        assert_eq!(report.code, Some(0.0));
        assert!(report.score <= 0.3 + 1e-9);
    }
}
