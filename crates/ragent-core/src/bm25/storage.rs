//! BM25 index persistence.
//!
//! The index is encoded with bincode v2 next to a small JSON metadata file:
//!
//! ```text
//! <index dir>/bm25/
//! ├── index.bin         # Serialized Bm25Index
//! └── meta.json         # Version and stats
//! ```

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::config;
use serde::{Deserialize, Serialize};

use super::index::{Bm25Index, Bm25IndexStats};
use crate::errors::RagError;

/// Directory name for BM25 index storage.
pub const BM25_DIR_NAME: &str = "bm25";

const INDEX_FILENAME: &str = "index.bin";
const META_FILENAME: &str = "meta.json";

/// BM25 index metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25IndexMeta {
    pub version: u32,
    pub stats: Bm25IndexStats,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

impl Bm25IndexMeta {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(stats: Bm25IndexStats) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            stats,
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Save a BM25 index under `<dir>/bm25/`, creating it if needed.
pub fn save_bm25_index(index: &Bm25Index, dir: &Path) -> Result<(), RagError> {
    let bm25_dir = dir.join(BM25_DIR_NAME);
    fs::create_dir_all(&bm25_dir)
        .map_err(|e| RagError::index_io(&bm25_dir, format!("Failed to create BM25 directory: {e}")))?;

    let index_file = bm25_dir.join(INDEX_FILENAME);
    let file = fs::File::create(&index_file)
        .map_err(|e| RagError::index_io(&index_file, format!("Failed to create BM25 index file: {e}")))?;
    let mut writer = BufWriter::new(file);

    bincode::encode_into_std_write(index, &mut writer, config::standard()).map_err(|e| {
        RagError::index_parse(&index_file, format!("Failed to serialize BM25 index: {e}"))
    })?;
    writer
        .flush()
        .map_err(|e| RagError::index_io(&index_file, format!("Failed to flush BM25 index: {e}")))?;

    let meta = Bm25IndexMeta::new(index.stats());
    let meta_file = bm25_dir.join(META_FILENAME);
    let meta_json = serde_json::to_string_pretty(&meta).map_err(|e| {
        RagError::index_parse(&meta_file, format!("Failed to serialize BM25 metadata: {e}"))
    })?;
    fs::write(&meta_file, meta_json)
        .map_err(|e| RagError::index_io(&meta_file, format!("Failed to write BM25 metadata: {e}")))?;

    tracing::debug!(
        "Saved BM25 index to {}: {} passages, {} terms",
        bm25_dir.display(),
        index.num_documents(),
        index.vocabulary_size()
    );

    Ok(())
}

/// Load the BM25 index from `<dir>/bm25/`.
///
/// Unlike a fresh workspace, a persisted index directory is expected to be
/// complete, so a missing or outdated index is an error.
pub fn load_bm25_index(dir: &Path) -> Result<Bm25Index, RagError> {
    let bm25_dir = dir.join(BM25_DIR_NAME);

    let meta_file = bm25_dir.join(META_FILENAME);
    let meta_content = fs::read_to_string(&meta_file)
        .map_err(|e| RagError::index_io(&meta_file, format!("Failed to read BM25 metadata: {e}")))?;
    let meta: Bm25IndexMeta = serde_json::from_str(&meta_content).map_err(|e| {
        RagError::index_parse(&meta_file, format!("Failed to parse BM25 metadata: {e}"))
    })?;

    if meta.version != Bm25IndexMeta::CURRENT_VERSION {
        return Err(RagError::index_parse(
            &meta_file,
            format!(
                "BM25 index version mismatch: found {}, expected {}",
                meta.version,
                Bm25IndexMeta::CURRENT_VERSION
            ),
        ));
    }

    let index_file = bm25_dir.join(INDEX_FILENAME);
    let file = fs::File::open(&index_file)
        .map_err(|e| RagError::index_io(&index_file, format!("Failed to open BM25 index: {e}")))?;
    let mut reader = BufReader::new(file);

    let index: Bm25Index = bincode::decode_from_std_read(&mut reader, config::standard())
        .map_err(|e| {
            RagError::index_parse(&index_file, format!("Failed to deserialize BM25 index: {e}"))
        })?;

    if index.num_documents() != meta.stats.num_documents {
        return Err(RagError::index_parse(
            &index_file,
            format!(
                "BM25 index holds {} passages but metadata records {}",
                index.num_documents(),
                meta.stats.num_documents
            ),
        ));
    }

    tracing::debug!(
        "Loaded BM25 index from {}: {} passages, {} terms",
        bm25_dir.display(),
        index.num_documents(),
        index.vocabulary_size()
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bm25::Bm25Config;
    use tempfile::TempDir;

    fn create_test_index() -> Bm25Index {
        Bm25Index::build(
            &Bm25Config::default(),
            ["hello world", "rust programming", "hello rust"],
        )
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let original = create_test_index();

        save_bm25_index(&original, temp_dir.path()).unwrap();
        assert!(temp_dir.path().join("bm25/index.bin").exists());
        assert!(temp_dir.path().join("bm25/meta.json").exists());

        let loaded = load_bm25_index(temp_dir.path()).unwrap();
        assert_eq!(loaded.num_documents(), original.num_documents());
        assert_eq!(loaded.vocabulary_size(), original.vocabulary_size());
        assert_eq!(loaded.search("rust", 10), original.search("rust", 10));
    }

    #[test]
    fn test_load_missing_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_bm25_index(temp_dir.path()).unwrap_err();
        assert!(matches!(err, RagError::IndexIo { .. }));
    }

    #[test]
    fn test_metadata_contents() {
        let temp_dir = TempDir::new().unwrap();
        save_bm25_index(&create_test_index(), temp_dir.path()).unwrap();

        let raw = fs::read_to_string(temp_dir.path().join("bm25/meta.json")).unwrap();
        let meta: Bm25IndexMeta = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta.version, Bm25IndexMeta::CURRENT_VERSION);
        assert_eq!(meta.stats.num_documents, 3);
        assert!(!meta.built_at.is_empty());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        save_bm25_index(&create_test_index(), temp_dir.path()).unwrap();

        let meta_path = temp_dir.path().join("bm25/meta.json");
        let raw = fs::read_to_string(&meta_path).unwrap();
        let mut meta: serde_json::Value = serde_json::from_str(&raw).unwrap();
        meta["version"] = serde_json::json!(99);
        fs::write(&meta_path, meta.to_string()).unwrap();

        let err = load_bm25_index(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_corrupt_index_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        save_bm25_index(&create_test_index(), temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("bm25/index.bin"), b"\xff\xff\xff").unwrap();

        let err = load_bm25_index(temp_dir.path()).unwrap_err();
        assert!(matches!(err, RagError::IndexParse { .. }));
    }
}
