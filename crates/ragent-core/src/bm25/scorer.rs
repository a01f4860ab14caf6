//! Okapi BM25 term scoring.
//!
//! ```text
//! score(D, Q) = Σ IDF(q) * tf(q, D) * (k1 + 1) / (tf(q, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Bm25Params {
    /// Term frequency saturation. Default: 1.2
    pub k1: f32,
    /// Length normalization, 0 (none) to 1 (full). Default: 0.75
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Smoothed inverse document frequency.
///
/// ```text
/// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)
/// ```
///
/// Always positive, even for terms present in every passage.
#[inline]
pub fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score contribution of one query term to one passage.
#[inline]
pub fn bm25_term_score(
    term_freq: usize,
    doc_len: usize,
    avg_doc_len: f32,
    idf_value: f32,
    params: &Bm25Params,
) -> f32 {
    let tf = term_freq as f32;
    let dl = doc_len as f32;
    // avg_doc_len is 0 only when every passage tokenized to nothing,
    // in which case no posting exists and this is never reached.
    let norm = if avg_doc_len > 0.0 { dl / avg_doc_len } else { 1.0 };

    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * norm);

    idf_value * numerator / denominator
}
