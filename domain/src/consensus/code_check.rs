//! Static quality gate for a winning code answer.
//!
//! Pure text inspection: nothing is compiled or executed.

use super::code::{normalize_code, strip_comments};
use super::sections::extract_code_blocks;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:TODO|FIXME|XXX)\b|\btodo!\(|\bunimplemented!\(|\bNotImplementedError\b")
        .expect("placeholder pattern is valid")
});

/// Validator for code contained in a final answer
pub trait CodeValidator: Send + Sync {
    /// Validate every code block of `response`; `Err` carries the issues.
    fn validate(&self, response: &str) -> Result<(), Vec<String>>;
}

/// Default [`CodeValidator`]: blocks must be non-empty, have balanced
/// delimiters and contain no placeholder markers.
#[derive(Debug, Clone, Default)]
pub struct StaticCodeValidator;

impl CodeValidator for StaticCodeValidator {
    fn validate(&self, response: &str) -> Result<(), Vec<String>> {
        let blocks = extract_code_blocks(response);
        if blocks.is_empty() {
            return Err(vec!["no code block found".to_string()]);
        }

        let mut issues = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let n = index + 1;
            if normalize_code(block).is_empty() {
                issues.push(format!("code block {} is empty", n));
                continue;
            }
            if let Err(problem) = check_delimiters(&strip_comments(block)) {
                issues.push(format!("code block {}: {}", n, problem));
            }
            if let Some(found) = PLACEHOLDER_RE.find(block) {
                issues.push(format!(
                    "code block {}: placeholder marker '{}'",
                    n,
                    found.as_str().trim_end_matches('(')
                ));
            }
            if block.lines().any(|line| matches!(line.trim(), "..." | "…")) {
                issues.push(format!("code block {}: elided code ('...')", n));
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

/// Check `()`, `[]` and `{}` nesting outside string and char literals.
fn check_delimiters(code: &str) -> Result<(), String> {
    let chars: Vec<char> = code.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '`' => {
                i += 1;
                while i < chars.len() && chars[i] != c && chars[i] != '\n' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            // char literals only; a lone quote is a lifetime or apostrophe
            '\'' => {
                if chars.get(i + 2) == Some(&'\'') {
                    i += 2;
                } else if chars.get(i + 1) == Some(&'\\') && chars.get(i + 3) == Some(&'\'') {
                    i += 3;
                }
            }
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Err(format!("unbalanced '{}'", c));
                }
            }
            _ => {}
        }
        i += 1;
    }

    match stack.last() {
        Some(open) => Err(format!("unclosed '{}'", open)),
        None => Ok(()),
    }
}
