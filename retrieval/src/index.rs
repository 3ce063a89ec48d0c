//! BM25 scoring index.
//!
//! Always built in one pass from a full snapshot of tokenized documents and
//! never patched afterwards. Documents are addressed by their position in the
//! store snapshot the index was built from.

use crate::config::{BM25_B, BM25_K1};
use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::time::Instant;

pub type DocIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, b: BM25_B }
    }
}

/// A document's score for one query, paired with its store position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc: DocIndex,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringIndex {
    /// term -> number of documents containing it
    pub df: HashMap<String, u32>,
    /// per-document term -> frequency
    pub doc_freqs: Vec<HashMap<String, u32>>,
    /// per-document term count
    pub doc_lengths: Vec<u32>,
    pub avgdl: f64,
    pub params: Bm25Params,
}

impl ScoringIndex {
    pub fn empty(params: Bm25Params) -> Self {
        Self { params, ..Self::default() }
    }

    /// Build from the term sequences of every stored document, in store order.
    pub fn build<I, T>(corpus: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[String]>,
    {
        let mut df: HashMap<String, u32> = HashMap::new();
        let mut doc_freqs = Vec::new();
        let mut doc_lengths = Vec::new();
        let mut total_len: u64 = 0;

        for terms in corpus {
            let terms = terms.as_ref();
            let mut tf: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *tf.entry(term.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lengths.push(terms.len() as u32);
            total_len += terms.len() as u64;
            doc_freqs.push(tf);
        }

        let avgdl = if doc_lengths.is_empty() { 0.0 } else { total_len as f64 / doc_lengths.len() as f64 };
        Self { df, doc_freqs, doc_lengths, avgdl, params }
    }

    pub fn num_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn num_terms(&self) -> usize {
        self.df.len()
    }

    /// `ln((N - n_t + 0.5) / (n_t + 0.5) + 1)`; strictly positive whenever `n_t <= N`.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.num_docs() as f64;
        let n_t = self.df.get(term).copied().unwrap_or(0) as f64;
        ((n - n_t + 0.5) / (n_t + 0.5) + 1.0).ln()
    }

    /// BM25 score of one document. Query terms are summed with repetition.
    pub fn score(&self, doc: DocIndex, query: &[String]) -> f64 {
        let Some(freqs) = self.doc_freqs.get(doc) else { return 0.0 };
        let Bm25Params { k1, b } = self.params;
        let ratio = if self.avgdl > 0.0 { self.doc_lengths[doc] as f64 / self.avgdl } else { 1.0 };
        let norm = k1 * (1.0 - b + b * ratio);

        query
            .iter()
            .filter_map(|term| freqs.get(term).map(|&f| (term, f as f64)))
            .map(|(term, f)| self.idf(term) * (f * (k1 + 1.0)) / (f + norm))
            .sum()
    }

    /// Scores for every document, in store order.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        (0..self.num_docs()).map(|doc| self.score(doc, query)).collect()
    }

    /// Top `k` documents by descending score. Ties keep store order. Every
    /// document is a candidate, including those scoring zero.
    pub fn top_k(&self, query: &[String], k: usize) -> Vec<Posting> {
        // without a deadline scoring cannot fail
        self.top_k_until(query, k, None).unwrap_or_default()
    }

    /// Like [`ScoringIndex::top_k`], but gives up with `DeadlineExceeded` once
    /// `deadline` passes. The deadline is checked between documents.
    pub fn top_k_until(&self, query: &[String], k: usize, deadline: Option<Instant>) -> Result<Vec<Posting>> {
        if query.is_empty() || self.num_docs() == 0 || k == 0 {
            return Ok(Vec::new());
        }
        let mut hits = Vec::with_capacity(self.num_docs());
        for doc in 0..self.num_docs() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(EngineError::DeadlineExceeded);
                }
            }
            hits.push(Posting { doc, score: self.score(doc, query) });
        }
        // stable: equal scores stay in store order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}
