//! TF-IDF vectorisation and cosine similarity over a small corpus.
//!
//! Each call fits a fresh vocabulary on the documents being compared, so the
//! weights only reflect the responses of one stage.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

/// Vocabulary cap; the most frequent terms across the corpus are kept.
pub const MAX_FEATURES: usize = 1000;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "else", "etc", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "if", "in", "into",
    "is", "it", "its", "itself", "just", "may", "me", "might", "more", "most", "must", "my",
    "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "thus", "to", "too", "under", "until", "up", "upon", "us",
    "very", "was", "we", "were", "what", "when", "where", "whether", "which", "while", "who",
    "whom", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

type SparseVector = BTreeMap<usize, f64>;

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !STOP_SET.contains(token))
        .map(String::from)
        .collect()
}

/// L2-normalised TF-IDF vectors for `docs`.
///
/// Returns `None` when the fitted vocabulary is empty or any document
/// ends up with a zero vector, i.e. when cosine similarity is undefined.
fn fit_transform(docs: &[&str]) -> Option<Vec<SparseVector>> {
    let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();

    let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let mut seen = HashSet::new();
        for token in tokens {
            *corpus_freq.entry(token.as_str()).or_default() += 1;
            if seen.insert(token.as_str()) {
                *doc_freq.entry(token.as_str()).or_default() += 1;
            }
        }
    }
    if corpus_freq.is_empty() {
        return None;
    }

    let mut terms: Vec<(&str, usize)> = corpus_freq.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    terms.truncate(MAX_FEATURES);
    let vocabulary: HashMap<&str, usize> = terms
        .iter()
        .enumerate()
        .map(|(index, (term, _))| (*term, index))
        .collect();

    let n = docs.len() as f64;
    let idf: Vec<f64> = terms
        .iter()
        .map(|(term, _)| {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        })
        .collect();

    let mut vectors = Vec::with_capacity(tokenized.len());
    for tokens in &tokenized {
        let mut vector = SparseVector::new();
        for token in tokens {
            if let Some(&index) = vocabulary.get(token.as_str()) {
                *vector.entry(index).or_default() += 1.0;
            }
        }
        for (index, weight) in vector.iter_mut() {
            *weight *= idf[*index];
        }
        let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return None;
        }
        for weight in vector.values_mut() {
            *weight /= norm;
        }
        vectors.push(vector);
    }
    Some(vectors)
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(k, v)| large.get(k).map(|w| v * w))
        .sum()
}

/// Mean cosine similarity over every unordered pair of documents.
///
/// Returns `None` for fewer than two documents or a degenerate
/// vectorisation.
///
/// # Example
///
/// ```
/// use consensus_domain::consensus::tfidf::average_pairwise_similarity;
///
/// let same = average_pairwise_similarity(&["binary search tree", "binary search tree"]);
/// assert!((same.unwrap() - 1.0).abs() < 1e-9);
/// assert!(average_pairwise_similarity(&["the of", "and to"]).is_none());
/// ```
pub fn average_pairwise_similarity(docs: &[&str]) -> Option<f64> {
    if docs.len() < 2 {
        return None;
    }
    let vectors = fit_transform(docs)?;
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            total += cosine(&vectors[i], &vectors[j]);
            pairs += 1;
        }
    }
    Some((total / pairs as f64).clamp(0.0, 1.0))
}
