//! Sidecar metadata for a persisted vector index.

use serde::{Deserialize, Serialize};

use super::traits::VectorMetric;

/// Filename for the serialized vectors.
pub const INDEX_FILENAME: &str = "vectors.bin";

/// Filename for the index metadata.
pub const INDEX_META_FILENAME: &str = "meta.json";

/// Metadata for a persisted vector index.
///
/// Stored in `meta.json` next to the binary payload so compatibility can be
/// checked without decoding the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexMeta {
    /// Backend used for this index.
    pub backend: String,

    /// Dimension of vectors.
    pub dimension: usize,

    /// Distance metric.
    pub metric: VectorMetric,

    /// Number of vectors.
    #[serde(default)]
    pub count: usize,

    /// Schema version for future migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_schema_version() -> u32 {
    VectorIndexMeta::CURRENT_SCHEMA_VERSION
}

impl VectorIndexMeta {
    /// Current on-disk schema version.
    pub const CURRENT_SCHEMA_VERSION: u32 = 1;

    /// Create new metadata stamped with the current time.
    pub fn new(
        backend: impl Into<String>,
        dimension: usize,
        metric: VectorMetric,
        count: usize,
    ) -> Self {
        Self {
            backend: backend.into(),
            dimension,
            metric,
            count,
            schema_version: Self::CURRENT_SCHEMA_VERSION,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}
