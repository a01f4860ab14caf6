//! Flat (exhaustive) vector index with bincode persistence.
//!
//! Storage layout:
//!
//! ```text
//! <dir>/
//! ├── vectors.bin   # bincode-encoded FlatVectorIndex
//! └── meta.json     # VectorIndexMeta
//! ```

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use bincode::{config, Decode, Encode};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::meta::{VectorIndexMeta, INDEX_FILENAME, INDEX_META_FILENAME};
use super::metadata::MetadataFilter;
use super::traits::{VectorIndexBackend, VectorMetric, VectorRecord, VectorSearchResult};
use crate::error::{DbError, DbResult};

/// Backend name recorded in `meta.json`.
const BACKEND_NAME: &str = "flat";

/// Exhaustive nearest-neighbour index over an in-memory vector matrix.
///
/// Immutable once built and shared behind an `Arc`; rebuilding means
/// constructing a new index.
#[derive(Debug, Clone, Encode, Decode)]
pub struct FlatVectorIndex {
    dimension: usize,
    metric: VectorMetric,
    records: Vec<VectorRecord>,
}

impl FlatVectorIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize, metric: VectorMetric) -> Self {
        Self {
            dimension,
            metric,
            records: Vec::new(),
        }
    }

    /// Append records, rejecting any whose dimension differs from the index.
    ///
    /// Validation happens before anything is stored, so a failed call leaves
    /// the index unchanged.
    pub fn insert(&mut self, records: Vec<VectorRecord>) -> DbResult<()> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        debug!("Inserting {} vectors into flat index", records.len());
        self.records.extend(records);
        Ok(())
    }

    /// Access stored records in insertion order.
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Save the index to `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> DbResult<()> {
        fs::create_dir_all(dir)
            .map_err(|e| DbError::vector_io(dir, format!("Failed to create directory: {}", e)))?;

        let index_file = dir.join(INDEX_FILENAME);
        let file = fs::File::create(&index_file)
            .map_err(|e| DbError::vector_io(&index_file, format!("Failed to create file: {}", e)))?;
        let mut writer = BufWriter::new(file);
        bincode::encode_into_std_write(self, &mut writer, config::standard()).map_err(|e| {
            DbError::vector_parse(&index_file, format!("Failed to serialize vectors: {}", e))
        })?;

        let meta = VectorIndexMeta::new(BACKEND_NAME, self.dimension, self.metric, self.len());
        let meta_file = dir.join(INDEX_META_FILENAME);
        let meta_json = serde_json::to_string_pretty(&meta)?;
        fs::write(&meta_file, meta_json)
            .map_err(|e| DbError::vector_io(&meta_file, format!("Failed to write metadata: {}", e)))?;

        debug!(
            "Saved flat vector index to {}: {} vectors, dim {}",
            dir.display(),
            self.len(),
            self.dimension
        );
        Ok(())
    }

    /// Load an index previously written by [`FlatVectorIndex::save`].
    ///
    /// # Errors
    ///
    /// - [`DbError::IndexNotFound`] if `dir` holds no index
    /// - [`DbError::IndexIncompatible`] if the payload disagrees with `meta.json`
    /// - [`DbError::VectorParse`] if either file cannot be decoded
    pub fn load(dir: &Path) -> DbResult<Self> {
        let meta_file = dir.join(INDEX_META_FILENAME);
        let index_file = dir.join(INDEX_FILENAME);
        if !meta_file.exists() || !index_file.exists() {
            return Err(DbError::IndexNotFound {
                path: dir.to_path_buf(),
            });
        }

        let meta_content = fs::read_to_string(&meta_file)
            .map_err(|e| DbError::vector_io(&meta_file, format!("Failed to read metadata: {}", e)))?;
        let meta: VectorIndexMeta = serde_json::from_str(&meta_content).map_err(|e| {
            DbError::vector_parse(&meta_file, format!("Failed to parse metadata: {}", e))
        })?;

        if meta.schema_version != VectorIndexMeta::CURRENT_SCHEMA_VERSION {
            return Err(DbError::index_incompatible(
                dir,
                format!(
                    "schema version {} (expected {})",
                    meta.schema_version,
                    VectorIndexMeta::CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        let file = fs::File::open(&index_file)
            .map_err(|e| DbError::vector_io(&index_file, format!("Failed to open file: {}", e)))?;
        let mut reader = BufReader::new(file);
        let index: FlatVectorIndex = bincode::decode_from_std_read(&mut reader, config::standard())
            .map_err(|e| {
                DbError::vector_parse(&index_file, format!("Failed to deserialize vectors: {}", e))
            })?;

        if index.dimension != meta.dimension || index.len() != meta.count {
            return Err(DbError::index_incompatible(
                dir,
                format!(
                    "metadata says {} vectors of dim {}, payload has {} of dim {}",
                    meta.count,
                    meta.dimension,
                    index.len(),
                    index.dimension
                ),
            ));
        }

        debug!(
            "Loaded flat vector index from {}: {} vectors, dim {}",
            dir.display(),
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(query, candidate),
            VectorMetric::Dot => dot_product(query, candidate),
            VectorMetric::L2 => -euclidean_distance(query, candidate),
        }
    }
}

impl VectorIndexBackend for FlatVectorIndex {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> DbResult<Vec<VectorSearchResult>> {
        if self.records.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let filter = filter.filter(|f| !f.is_empty());
        let mut hits: Vec<VectorSearchResult> = self
            .records
            .par_iter()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.metadata)))
            .map(|record| VectorSearchResult {
                position: record.position,
                score: self.score(query, &record.vector),
            })
            .collect();

        // Position breaks ties so equal scores rank the same on every run
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(limit);

        trace!("Flat search returned {} hits", hits.len());
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute dot product between two vectors.
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute Euclidean (L2) distance between two vectors.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Metadata;
    use tempfile::TempDir;

    fn record(position: usize, vector: Vec<f32>, source: &str) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), source.into());
        VectorRecord::new(position, vector).with_metadata(metadata)
    }

    fn sample_index() -> FlatVectorIndex {
        let mut index = FlatVectorIndex::new(3, VectorMetric::Cosine);
        index
            .insert(vec![
                record(0, vec![1.0, 0.0, 0.0], "a"),
                record(1, vec![0.0, 1.0, 0.0], "b"),
                record(2, vec![0.7, 0.7, 0.0], "a"),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!((dot_product(&a, &b) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![3.0, 4.0, 0.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.1, 0.0], 3, None).unwrap();
        let positions: Vec<_> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_respects_limit() {
        let index = sample_index();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1, None).unwrap().len(), 1);
        assert!(index.search(&[1.0, 0.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_applies_filter() {
        let index = sample_index();
        let filter = MetadataFilter::new().with("source", "b");
        let hits = index.search(&[1.0, 0.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_l2_prefers_nearest() {
        let mut index = FlatVectorIndex::new(2, VectorMetric::L2);
        index
            .insert(vec![
                VectorRecord::new(0, vec![10.0, 10.0]),
                VectorRecord::new(1, vec![1.0, 1.0]),
            ])
            .unwrap();
        let hits = index.search(&[0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_insert_rejects_dimension_mismatch() {
        let mut index = FlatVectorIndex::new(3, VectorMetric::Cosine);
        let err = index
            .insert(vec![
                VectorRecord::new(0, vec![1.0, 0.0, 0.0]),
                VectorRecord::new(1, vec![1.0]),
            ])
            .unwrap_err();
        assert!(matches!(err, DbError::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_rejects_query_dimension_mismatch() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0], 3, None).is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatVectorIndex::new(0, VectorMetric::Cosine);
        assert!(index.search(&[1.0, 2.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let index = sample_index();
        index.save(temp_dir.path()).unwrap();

        let loaded = FlatVectorIndex::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.records(), index.records());

        let hits = loaded.search(&[0.0, 1.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = FlatVectorIndex::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, DbError::IndexNotFound { .. }));
    }

    #[test]
    fn test_load_detects_count_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        sample_index().save(temp_dir.path()).unwrap();

        let meta_file = temp_dir.path().join(INDEX_META_FILENAME);
        let mut meta: VectorIndexMeta =
            serde_json::from_str(&fs::read_to_string(&meta_file).unwrap()).unwrap();
        meta.count = 99;
        fs::write(&meta_file, serde_json::to_string(&meta).unwrap()).unwrap();

        let err = FlatVectorIndex::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, DbError::IndexIncompatible { .. }));
    }

    #[test]
    fn test_load_rejects_corrupt_payload() {
        let temp_dir = TempDir::new().unwrap();
        sample_index().save(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join(INDEX_FILENAME), b"garbage").unwrap();

        assert!(FlatVectorIndex::load(temp_dir.path()).is_err());
    }
}
