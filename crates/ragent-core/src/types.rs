//! Common data types shared across the pipeline.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use ragent_db::vector::{Metadata, MetadataFilter, MetadataValue};

// ============================================================================
// Passage
// ============================================================================

/// Immutable unit of retrievable text.
///
/// Two passages with identical `content` are the same passage for fusion and
/// deduplication, whatever their metadata says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub content: String,

    /// Scalar metadata (source identifier, page, ...).
    #[serde(default)]
    pub metadata: Metadata,
}

impl Passage {
    /// Create a passage without metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identity key used by fusion and deduplication.
    pub fn identity(&self) -> &str {
        &self.content
    }
}

/// Remove repeated passages, keeping the first occurrence of each identity.
pub fn dedup_by_content(passages: impl IntoIterator<Item = Passage>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|p| seen.insert(p.content.clone()))
        .collect()
}

// ============================================================================
// Citation
// ============================================================================

/// Provenance record surfaced next to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub content: String,
    pub metadata: Metadata,
}

impl From<&Passage> for Citation {
    fn from(passage: &Passage) -> Self {
        Self {
            content: passage.content.clone(),
            metadata: passage.metadata.clone(),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Role name in lowercase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Capitalized label used when rendering history.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "human" => Ok(Self::User),
            "assistant" | "ai" | "bot" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// One conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
