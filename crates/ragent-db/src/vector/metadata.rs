//! Passage metadata values and equality filters.

use std::collections::BTreeMap;
use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Metadata attached to a stored vector: string keys to scalar values.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A scalar metadata value.
///
/// Serialized untagged so JSON metadata such as `{"source": "doc1", "page": 3}`
/// maps directly onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Return the value as a string slice if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Equality that treats `3` and `3.0` as the same value.
    pub fn loosely_equals(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ============================================================================
// MetadataFilter
// ============================================================================

/// Conjunction of `key == value` conditions over metadata.
///
/// An empty filter matches everything. A key absent from the metadata never
/// matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, MetadataValue>,
}

impl MetadataFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Iterate over the filter's conditions.
    pub fn conditions(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.conditions.iter()
    }

    /// Check whether `metadata` satisfies every condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| actual.loosely_equals(expected))
        })
    }
}

impl From<BTreeMap<String, MetadataValue>> for MetadataFilter {
    fn from(conditions: BTreeMap<String, MetadataValue>) -> Self {
        Self { conditions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        let mut m = Metadata::new();
        m.insert("source".to_string(), "doc1".into());
        m.insert("page".to_string(), 3i64.into());
        m
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(MetadataFilter::new().matches(&sample()));
        assert!(MetadataFilter::new().matches(&Metadata::new()));
    }

    #[test]
    fn test_filter_equality() {
        let metadata = sample();
        assert!(MetadataFilter::new().with("source", "doc1").matches(&metadata));
        assert!(!MetadataFilter::new().with("source", "doc2").matches(&metadata));
        assert!(!MetadataFilter::new().with("author", "x").matches(&metadata));
    }

    #[test]
    fn test_filter_is_conjunction() {
        let metadata = sample();
        let filter = MetadataFilter::new().with("source", "doc1").with("page", 4i64);
        assert!(!filter.matches(&metadata));

        let filter = MetadataFilter::new().with("source", "doc1").with("page", 3i64);
        assert!(filter.matches(&metadata));
    }

    #[test]
    fn test_numeric_values_compare_loosely() {
        let filter = MetadataFilter::new().with("page", 3.0f64);
        assert!(filter.matches(&sample()));
    }

    #[test]
    fn test_untagged_json() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"source":"doc1","page":3,"score":0.5,"draft":false}"#)
                .unwrap();
        assert_eq!(metadata["source"], MetadataValue::Text("doc1".to_string()));
        assert_eq!(metadata["page"], MetadataValue::Integer(3));
        assert_eq!(metadata["score"], MetadataValue::Float(0.5));
        assert_eq!(metadata["draft"], MetadataValue::Bool(false));
    }
}
