//! Token-level similarity used by rule and journal de-duplication.

use crate::core::config::RuleSimilarity;
use std::collections::BTreeSet;

/// Lower-case, split on non-alphabetic characters, drop tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Overlap coefficient: shared tokens over the smaller set.
pub fn overlap_coefficient(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / smaller as f64
}

/// Shared tokens over the query's token count.
pub fn query_overlap(query: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f64 {
    query.intersection(candidate).count() as f64 / query.len().max(1) as f64
}

fn normalized(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

const NEGATIONS: &[&str] = &["never", "not", "no", "avoid", "don't", "dont", "without"];

/// Whether `text` states a prohibition ("never", "don't", "shouldn't", ...).
pub fn is_negated(text: &str) -> bool {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !c.is_alphabetic() && c != '\'')
        .any(|w| NEGATIONS.contains(&w) || w.ends_with("n't"))
}

/// Similarity between two rule texts. Identical texts score 1.0 even when
/// they contain no indexable tokens. A prohibition never matches its
/// positive form.
pub fn rule_similarity(a: &str, b: &str, metric: RuleSimilarity) -> f64 {
    if normalized(a) == normalized(b) {
        return 1.0;
    }
    if is_negated(a) != is_negated(b) {
        return 0.0;
    }
    let (ta, tb) = (token_set(a), token_set(b));
    match metric {
        RuleSimilarity::Overlap => overlap_coefficient(&ta, &tb),
        RuleSimilarity::Jaccard => jaccard(&ta, &tb),
    }
}

/// Similarity of an incoming journal title against an existing one.
pub fn title_similarity(incoming: &str, existing: &str) -> f64 {
    if normalized(incoming) == normalized(existing) {
        return 1.0;
    }
    query_overlap(&token_set(incoming), &token_set(existing))
}
