//! Structural parsing of agent responses.
//!
//! Responses are free-form text organised into upper-case labelled sections
//! (`LABEL: content`) with optional fenced code blocks. Parsing is fence-aware:
//! a line inside a ```` ``` ```` block is never treated as a section header.

use std::collections::{BTreeMap, BTreeSet};

const FENCE: &str = "```";
const MAX_LABEL_LEN: usize = 40;

/// Section label carrying the final answer.
pub const IMPLEMENTATION: &str = "IMPLEMENTATION";
/// Section label used for cited evidence.
pub const EVIDENCE: &str = "EVIDENCE";
/// Section label carrying the self-reported confidence.
pub const CONFIDENCE: &str = "CONFIDENCE";

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// Try to read `line` as a `LABEL: content` header.
///
/// Leading markdown decoration (`#`, bullets, bold markers) is ignored.
/// Spaces and hyphens inside a label are normalised to underscores.
fn parse_header(line: &str) -> Option<(String, &str)> {
    let trimmed = line
        .trim()
        .trim_start_matches('#')
        .trim_start()
        .trim_start_matches(['-', '*', '•'])
        .trim_start();
    let (raw_label, rest) = trimmed.split_once(':')?;
    let label = raw_label.trim().trim_matches('*').trim();

    let first = label.chars().next()?;
    if !first.is_ascii_uppercase() || label.len() > MAX_LABEL_LEN {
        return None;
    }
    let valid = label
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '_' | ' ' | '-'));
    if !valid {
        return None;
    }

    let normalized = label
        .split([' ', '-'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let content = rest.trim_start_matches('*').trim();
    Some((normalized, content))
}

/// Split a response into its labelled sections.
///
/// Text before the first header is dropped. A label that appears twice has
/// its contents concatenated.
///
/// # Example
///
/// ```
/// use consensus_domain::consensus::sections::parse_sections;
///
/// let sections = parse_sections("UNDERSTANDING: sort numbers\nascending\nCONFIDENCE: 0.9");
/// assert_eq!(sections["UNDERSTANDING"], "sort numbers\nascending");
/// assert_eq!(sections["CONFIDENCE"], "0.9");
/// ```
pub fn parse_sections(text: &str) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut in_fence = false;

    for line in text.lines() {
        if !in_fence
            && let Some((label, content)) = parse_header(line)
        {
            let entry = sections.entry(label.clone()).or_default();
            if !content.is_empty() {
                entry.push(content);
            }
            if is_fence(content) {
                in_fence = true;
            }
            current = Some(label);
            continue;
        }

        if is_fence(line) {
            in_fence = !in_fence;
        }
        if let Some(label) = &current
            && let Some(lines) = sections.get_mut(label)
        {
            lines.push(line);
        }
    }

    sections
        .into_iter()
        .map(|(label, lines)| (label, lines.join("\n").trim().to_string()))
        .collect()
}

/// Contents of every fenced code block, in order of appearance.
///
/// An unterminated block runs to the end of the text.
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        if is_fence(line) {
            match current.take() {
                Some(lines) => blocks.push(lines.join("\n")),
                None => current = Some(Vec::new()),
            }
        } else if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        blocks.push(lines.join("\n"));
    }
    blocks
}

/// Whether the text contains a fenced code block.
///
/// Agrees with [`extract_code_blocks`]: only a line opening with a fence
/// counts, so backticks mentioned mid-line are prose.
pub fn has_code(text: &str) -> bool {
    text.lines().any(is_fence)
}

/// Remove fenced code blocks, fences included.
pub fn strip_code_blocks(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// Case-fold, strip code blocks and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    strip_code_blocks(text)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Items of the `EVIDENCE` section, or `None` when the response has none.
///
/// Items are separated by commas or newlines; bullets are stripped and
/// comparison is case-insensitive.
pub fn extract_evidence(text: &str) -> Option<BTreeSet<String>> {
    let sections = parse_sections(text);
    let evidence = sections.get(EVIDENCE)?;
    Some(
        evidence
            .split([',', '\n'])
            .map(|item| {
                item.trim()
                    .trim_start_matches(['-', '*', '•'])
                    .trim()
                    .to_lowercase()
            })
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// The answer a response commits to.
///
/// Prefers the `IMPLEMENTATION` section, then `FINAL_POSITION`; otherwise
/// the whole response without its `CONFIDENCE` section.
pub fn extract_final_answer(text: &str) -> String {
    let sections = parse_sections(text);
    for label in [IMPLEMENTATION, "FINAL_POSITION"] {
        if let Some(content) = sections.get(label)
            && !content.is_empty()
        {
            return content.clone();
        }
    }

    let mut kept = Vec::new();
    let mut in_fence = false;
    let mut skipping = false;
    for line in text.lines() {
        if !in_fence && let Some((label, _)) = parse_header(line) {
            skipping = label == CONFIDENCE;
        }
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if !skipping {
            kept.push(line);
        }
    }
    kept.join("\n").trim().to_string()
}

/// Required labels absent from a response.
pub fn missing_sections(text: &str, required: &[&'static str]) -> Vec<&'static str> {
    let sections = parse_sections(text);
    required
        .iter()
        .copied()
        .filter(|label| !sections.contains_key(*label))
        .collect()
}
