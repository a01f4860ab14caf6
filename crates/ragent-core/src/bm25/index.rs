//! BM25 Inverted Index.
//!
//! Provides an inverted index optimized for BM25 scoring:
//! - Term → passage postings with term frequencies
//! - Pre-computed passage lengths and average length
//! - Query-time scoring over postings only
//!
//! Passages are identified by their position in the corpus the index was
//! built from, so the caller's passage list resolves hits back to text.

use std::collections::HashMap;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::{Tokenizer, TokenizerConfig};
use super::{Bm25Config, Bm25SearchResult};

/// Posting entry: passage position and term frequency.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
struct Posting {
    position: usize,
    term_freq: usize,
}

/// BM25 Inverted Index.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct Bm25Index {
    /// BM25 parameters.
    params: Bm25Params,
    /// Tokenizer configuration (for query tokenization).
    tokenizer_config: TokenizerConfig,
    /// Term → (document_frequency, postings).
    inverted_index: HashMap<String, (usize, Vec<Posting>)>,
    /// Token count of each passage, indexed by position.
    lengths: Vec<usize>,
    /// Average passage length.
    avg_doc_len: f32,
    /// Total number of tokens in the corpus.
    total_tokens: usize,
}

impl Bm25Index {
    /// Create a new empty BM25 index.
    pub fn new(config: &Bm25Config) -> Self {
        Self {
            params: Bm25Params {
                k1: config.k1,
                b: config.b,
            },
            tokenizer_config: TokenizerConfig {
                stemming: config.stemming,
                remove_stopwords: config.remove_stopwords,
                min_token_length: config.min_token_length,
            },
            inverted_index: HashMap::new(),
            lengths: Vec::new(),
            avg_doc_len: 0.0,
            total_tokens: 0,
        }
    }

    /// Build an index over `texts`; the n-th text gets position n.
    pub fn build<I, S>(config: &Bm25Config, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new(config);
        let tokenizer = Tokenizer::new(index.tokenizer_config.clone());
        for text in texts {
            index.add_tokens(tokenizer.tokenize(text.as_ref()));
        }
        index
    }

    /// Add a passage to the index and return its position.
    pub fn add_document(&mut self, text: &str) -> usize {
        let tokenizer = Tokenizer::new(self.tokenizer_config.clone());
        self.add_tokens(tokenizer.tokenize(text))
    }

    fn add_tokens(&mut self, tokens: Vec<String>) -> usize {
        let doc_len = tokens.len();

        let mut term_freqs: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        let position = self.lengths.len();
        self.lengths.push(doc_len);

        for (term, tf) in term_freqs {
            let entry = self.inverted_index.entry(term).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(Posting {
                position,
                term_freq: tf,
            });
        }

        self.total_tokens += doc_len;
        self.avg_doc_len = self.total_tokens as f32 / self.lengths.len() as f32;

        position
    }

    /// Search the index for passages matching the query.
    ///
    /// Returns at most `top_k` hits sorted by BM25 score descending, ties
    /// broken by position so results are reproducible. Passages sharing no
    /// term with the query are never returned.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Bm25SearchResult> {
        if self.lengths.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let tokenizer = Tokenizer::new(self.tokenizer_config.clone());
        let mut query_tokens = tokenizer.tokenize(query);
        query_tokens.sort();
        query_tokens.dedup();

        let num_docs = self.lengths.len();
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in &query_tokens {
            let Some((df, postings)) = self.inverted_index.get(term) else {
                continue;
            };
            let idf_val = idf(num_docs, *df);
            for posting in postings {
                let term_score = bm25_term_score(
                    posting.term_freq,
                    self.lengths[posting.position],
                    self.avg_doc_len,
                    idf_val,
                    &self.params,
                );
                *scores.entry(posting.position).or_insert(0.0) += term_score;
            }
        }

        let mut scored: Vec<(usize, f32)> = scores.into_iter().collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (position, score))| Bm25SearchResult {
                position,
                score,
                rank,
            })
            .collect()
    }

    /// Get the number of indexed passages.
    pub fn num_documents(&self) -> usize {
        self.lengths.len()
    }

    /// Get the number of unique terms in the vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.inverted_index.len()
    }

    /// Get document frequency for an already-normalized term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.inverted_index
            .get(term)
            .map(|(df, _)| *df)
            .unwrap_or(0)
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Get index statistics for logging and metadata.
    pub fn stats(&self) -> Bm25IndexStats {
        Bm25IndexStats {
            num_documents: self.lengths.len(),
            vocabulary_size: self.inverted_index.len(),
            total_tokens: self.total_tokens,
            avg_doc_length: self.avg_doc_len,
        }
    }
}

/// Statistics about the BM25 index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25IndexStats {
    pub num_documents: usize,
    pub vocabulary_size: usize,
    pub total_tokens: usize,
    pub avg_doc_length: f32,
}
