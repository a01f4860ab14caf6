//! Unicode-aware tokenizer with stemming for BM25.
//!
//! Text runs through:
//! 1. Unicode word segmentation
//! 2. Lowercasing
//! 3. Dropping tokens without any letter (bare numbers)
//! 4. Minimum length filter
//! 5. Stop word removal (optional)
//! 6. English Snowball stemming (optional)
//!
//! Queries and passages go through the same pipeline, so a query for
//! "indexes" matches a passage mentioning "indexing".

use std::collections::HashSet;

use bincode::{Decode, Encode};
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Tokenizer configuration, stored alongside the index so queries are
/// tokenized the same way the corpus was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TokenizerConfig {
    pub stemming: bool,
    pub remove_stopwords: bool,
    pub min_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            stemming: true,
            remove_stopwords: true,
            min_token_length: 2,
        }
    }
}

/// Unicode-aware tokenizer with optional stemming.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let stemmer = config
            .stemming
            .then(|| Stemmer::create(Algorithm::English));

        Self {
            config,
            stemmer,
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Tokenize text into processed terms, in order of appearance.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter_map(|word| self.process_token(word))
            .collect()
    }

    fn process_token(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();

        if !lower.chars().any(char::is_alphabetic) {
            return None;
        }

        if lower.chars().count() < self.config.min_token_length {
            return None;
        }

        if self.config.remove_stopwords && self.stopwords.contains(lower.as_str()) {
            return None;
        }

        let token = match &self.stemmer {
            Some(stemmer) => stemmer.stem(&lower).into_owned(),
            None => lower,
        };

        // Stemming can shorten below the threshold
        if token.chars().count() < self.config.min_token_length {
            return None;
        }

        Some(token)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

/// Common English function words. Content verbs and nouns are kept.
const STOPWORDS: &[&str] = &[
    // Articles
    "a", "an", "the",
    // Prepositions
    "in", "on", "at", "to", "of", "with", "by", "from", "as", "into", "through", "during",
    "before", "after", "above", "below", "between", "under", "over", "out", "up", "down", "off",
    "for", "about",
    // Conjunctions
    "and", "or", "but", "nor", "so", "yet", "if", "whether",
    // Pronouns
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "your",
    "his", "its", "our", "their", "this", "that", "these", "those", "which", "who", "whom",
    "whose", "what", "where", "when", "how", "why",
    // Auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having", "do",
    "does", "did", "doing", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can",
    // Quantifiers and adverbs
    "not", "no", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "than", "too", "very", "just", "also", "only", "own", "same", "then", "there", "here", "now",
];
