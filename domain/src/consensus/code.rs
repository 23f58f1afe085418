//! Code-aware similarity between fenced code blocks.
//!
//! Per block pair:
//!
//! ```text
//! 0.5 * sequence ratio of normalised code
//! + 0.3 * sequence ratio of function signatures
//! + 0.2 * Jaccard over identifiers
//! ```
//!
//! The response-level score is the minimum over every compared pair, so a
//! single divergent implementation pulls the whole stage down.

use super::sequence;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const STRUCTURE_WEIGHT: f64 = 0.5;
const SIGNATURE_WEIGHT: f64 = 0.3;
const IDENTIFIER_WEIGHT: f64 = 0.2;

static SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:def|fn|function|func)\s+\w+\s*(?:<[^>]*>)?\s*\([^)]*\)")
        .expect("signature pattern is valid")
});

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_]\w*\b").expect("identifier pattern is valid"));

/// Remove `//`, `/* */` and `# ` comments outside string literals.
///
/// `#` only starts a comment when followed by whitespace or end of line, so
/// `#include` and `#[derive]` survive.
pub fn strip_comments(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(n) = next {
                    out.push(n);
                    i += 1;
                }
            } else if c == q || c == '\n' {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('"' | '\'' | '`', _) => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ('#', n) if n.is_none_or(char::is_whitespace) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Strip comments, trim each line and drop blank lines.
pub fn normalize_code(code: &str) -> String {
    strip_comments(code)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Function signatures found in the code, space separated.
pub fn extract_signatures(code: &str) -> String {
    SIGNATURE_RE
        .find_iter(code)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn identifiers(code: &str) -> BTreeSet<&str> {
    IDENTIFIER_RE.find_iter(code).map(|m| m.as_str()).collect()
}

/// Jaccard index of two sets; two empty sets are identical.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Similarity of two normalised code blocks.
pub fn compare_blocks(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let structure = sequence::ratio(a, b);

    let sig_a = extract_signatures(a);
    let sig_b = extract_signatures(b);
    let signature = if sig_a.is_empty() && sig_b.is_empty() {
        structure
    } else {
        sequence::ratio(&sig_a, &sig_b)
    };

    let names = jaccard(&identifiers(a), &identifiers(b));

    STRUCTURE_WEIGHT * structure + SIGNATURE_WEIGHT * signature + IDENTIFIER_WEIGHT * names
}

/// Minimum block similarity across all response pairs.
///
/// `blocks` holds the normalised code blocks of each response; blocks are
/// paired positionally. A response without code makes the score 0.0.
///
/// # Example
///
/// ```
/// use consensus_domain::consensus::code::code_similarity;
///
/// let block = "def add(a, b):\nreturn a + b".to_string();
/// assert_eq!(code_similarity(&[vec![block.clone()], vec![block]]), 1.0);
/// ```
pub fn code_similarity(blocks: &[Vec<String>]) -> f64 {
    if blocks.len() < 2 {
        return 1.0;
    }
    if blocks.iter().any(Vec::is_empty) {
        return 0.0;
    }

    let mut lowest: Option<f64> = None;
    for i in 0..blocks.len() {
        for j in (i + 1)..blocks.len() {
            for (a, b) in blocks[i].iter().zip(&blocks[j]) {
                let score = compare_blocks(a, b);
                lowest = Some(lowest.map_or(score, |l| l.min(score)));
            }
        }
    }
    lowest.unwrap_or(0.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_and_block_comments() {
        let code = "let x = 1; // counter\n/* block\ncomment */let y = 2;";
        assert_eq!(strip_comments(code), "let x = 1; \nlet y = 2;");
    }

    #[test]
    fn test_hash_comments_need_whitespace() {
        let code = "#[derive(Debug)]\nx = 1  # python comment\n#include <stdio.h>";
        let stripped = strip_comments(code);
        assert!(stripped.contains("#[derive(Debug)]"));
        assert!(stripped.contains("#include <stdio.h>"));
        assert!(!stripped.contains("python comment"));
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let code = r#"url = "http://example.com" # site"#;
        assert_eq!(strip_comments(code).trim_end(), r#"url = "http://example.com""#);
    }

    #[test]
    fn test_normalize_code() {
        let code = "  def f():\n\n      # note\n      return 1\n";
        assert_eq!(normalize_code(code), "def f():\nreturn 1");
    }

    #[test]
    fn test_extract_signatures_across_languages() {
        let code = "def add(a, b):\nfn parse<T>(s: &str) -> T\nfunction go(x) {}\nfunc Run(ctx Context)";
        assert_eq!(
            extract_signatures(code),
            "def add(a, b) fn parse<T>(s: &str) function go(x) func Run(ctx Context)"
        );
    }

    #[test]
    fn test_jaccard_edges() {
        let empty: BTreeSet<&str> = BTreeSet::new();
        let one: BTreeSet<&str> = ["a"].into_iter().collect();
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&one, &empty), 0.0);
    }

    #[test]
    fn test_renamed_variables_partial_similarity() {
        let a = normalize_code("def total(items):\n    acc = 0\n    for item in items:\n        acc += item\n    return acc");
        let b = normalize_code("def total(items):\n    s = 0\n    for x in items:\n        s += x\n    return s");
        let score = compare_blocks(&a, &b);
        assert!(score > 0.5 && score < 1.0, "score was {score}");
    }

    #[test]
    fn test_missing_code_scores_zero() {
        let blocks = vec![vec!["x = 1".to_string()], vec![]];
        assert_eq!(code_similarity(&blocks), 0.0);
    }

    #[test]
    fn test_minimum_over_pairs() {
        let same = "def f(x):\nreturn x".to_string();
        let other = "while True:\npass".to_string();
        let all_same = code_similarity(&[vec![same.clone()], vec![same.clone()], vec![same.clone()]]);
        let one_off = code_similarity(&[vec![same.clone()], vec![same.clone()], vec![other]]);
        assert_eq!(all_same, 1.0);
        assert!(one_off < all_same);
    }
}
