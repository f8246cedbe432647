//! TF-IDF ranking used to pick the closest existing document during merges.
//!
//! Document frequencies are recomputed on every call: corpora here are a
//! single profile's journal and change between calls.

use crate::core::similarity::tokenize;
use rustc_hash::FxHashMap;

pub const MAX_RESULTS: usize = 10;

/// Something that can be ranked: a primary text plus optional tags.
pub trait Searchable {
    fn search_text(&self) -> &str;

    fn search_tags(&self) -> Vec<&str> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    /// Index into the ranked slice.
    pub index: usize,
    pub score: f64,
}

/// `ln((N+1)/(df+1)) + 1`, strictly positive even when a token is in every document.
pub fn idf(n_docs: usize, doc_freq: usize) -> f64 {
    ((n_docs as f64 + 1.0) / (doc_freq as f64 + 1.0)).ln() + 1.0
}

/// Rank `docs` against `query`, highest score first, at most `MAX_RESULTS`.
/// Documents scoring zero are omitted; ties keep collection order.
pub fn rank<D: Searchable>(query: &str, docs: &[D]) -> Vec<Ranked> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || docs.is_empty() {
        return Vec::new();
    }

    let mut doc_freq: FxHashMap<String, usize> = FxHashMap::default();
    let mut doc_tokens: Vec<Vec<String>> = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut text = doc.search_text().to_string();
        for tag in doc.search_tags() {
            text.push(' ');
            text.push_str(tag);
        }
        let tokens = tokenize(&text);
        let mut seen: Vec<&String> = tokens.iter().collect();
        seen.sort();
        seen.dedup();
        for t in seen {
            *doc_freq.entry(t.clone()).or_insert(0) += 1;
        }
        doc_tokens.push(tokens);
    }

    let n = docs.len();
    let mut scored: Vec<Ranked> = Vec::new();
    for (index, tokens) in doc_tokens.iter().enumerate() {
        if tokens.is_empty() {
            continue;
        }
        let mut tf: FxHashMap<&str, usize> = FxHashMap::default();
        for t in tokens {
            *tf.entry(t.as_str()).or_insert(0) += 1;
        }
        let len = tokens.len() as f64;
        let score: f64 = query_tokens
            .iter()
            .map(|qt| {
                let count = tf.get(qt.as_str()).copied().unwrap_or(0);
                if count == 0 {
                    return 0.0;
                }
                let df = doc_freq.get(qt).copied().unwrap_or(0);
                (count as f64 / len) * idf(n, df)
            })
            .sum();
        if score > 0.0 {
            scored.push(Ranked { index, score });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    scored.truncate(MAX_RESULTS);
    scored
}

impl Searchable for String {
    fn search_text(&self) -> &str {
        self
    }
}

impl Searchable for &str {
    fn search_text(&self) -> &str {
        self
    }
}
