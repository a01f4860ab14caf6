//! Persisted index snapshots.
//!
//! A snapshot is the passage corpus plus the dense and lexical indexes built
//! from exactly that corpus. Snapshots are immutable: a rebuild produces a
//! new one and the retriever swaps its pointer.
//!
//! ## Storage Layout
//!
//! ```text
//! <index dir>/
//! ├── current/
//! │   ├── manifest.json     # Written last; no manifest means no index
//! │   ├── passages.json     # Corpus in index order
//! │   ├── vectors/          # FlatVectorIndex (bincode + meta.json)
//! │   └── bm25/             # Bm25Index (bincode + meta.json)
//! └── .staging-<uuid>/      # Only while a rebuild is being written
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ragent_db::vector::{FlatVectorIndex, VectorIndexBackend, VectorMetric};

use crate::bm25::{load_bm25_index, save_bm25_index, Bm25Index, Bm25SearchResult};
use crate::errors::RagError;
use crate::types::Passage;

const CURRENT_DIR_NAME: &str = "current";
const MANIFEST_FILENAME: &str = "manifest.json";
const PASSAGES_FILENAME: &str = "passages.json";
const VECTORS_DIR_NAME: &str = "vectors";

// ============================================================================
// LexicalIndex Trait
// ============================================================================

/// Read-side contract of a lexical index.
pub trait LexicalIndex: Send + Sync {
    /// Return up to `limit` passages ranked by term overlap with `query`.
    fn search(&self, query: &str, limit: usize) -> Vec<Bm25SearchResult>;

    /// Number of indexed passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LexicalIndex for Bm25Index {
    fn search(&self, query: &str, limit: usize) -> Vec<Bm25SearchResult> {
        Bm25Index::search(self, query, limit)
    }

    fn len(&self) -> usize {
        self.num_documents()
    }
}

// ============================================================================
// IndexSnapshot
// ============================================================================

/// A fully consistent, immutable index generation.
pub struct IndexSnapshot {
    passages: Vec<Passage>,
    dense: Arc<dyn VectorIndexBackend>,
    lexical: Arc<dyn LexicalIndex>,
}

impl IndexSnapshot {
    /// Assemble a snapshot, rejecting sub-indexes built from a different
    /// corpus size.
    pub fn new(
        passages: Vec<Passage>,
        dense: Arc<dyn VectorIndexBackend>,
        lexical: Arc<dyn LexicalIndex>,
    ) -> Result<Self, RagError> {
        if dense.len() != passages.len() || lexical.len() != passages.len() {
            return Err(RagError::InvalidConfiguration {
                message: format!(
                    "index snapshot is inconsistent: {} passages, {} vectors, {} lexical entries",
                    passages.len(),
                    dense.len(),
                    lexical.len()
                ),
                hint: "Rebuild the index from the full passage set".to_string(),
            });
        }
        Ok(Self {
            passages,
            dense,
            lexical,
        })
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// Passage at an index position, if any.
    pub fn passage(&self, position: usize) -> Option<&Passage> {
        self.passages.get(position)
    }

    pub fn dense(&self) -> &Arc<dyn VectorIndexBackend> {
        &self.dense
    }

    pub fn lexical(&self) -> &Arc<dyn LexicalIndex> {
        &self.lexical
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl std::fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("passages", &self.passages.len())
            .field("dimension", &self.dense.dimension())
            .field("metric", &self.dense.metric())
            .finish()
    }
}

// ============================================================================
// IndexManifest
// ============================================================================

/// Summary written after every other file of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    pub version: u32,
    pub passage_count: usize,
    pub dimension: usize,
    pub metric: VectorMetric,
    pub embedding_model: String,
    pub built_at: String,
}

impl IndexManifest {
    pub const CURRENT_VERSION: u32 = 1;
}

// ============================================================================
// IndexStore
// ============================================================================

/// On-disk home of the current index snapshot.
///
/// All methods block on filesystem I/O; async callers run them through
/// `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the live snapshot.
    pub fn current_dir(&self) -> PathBuf {
        self.root.join(CURRENT_DIR_NAME)
    }

    /// Whether a complete snapshot is on disk.
    pub fn exists(&self) -> bool {
        self.current_dir().join(MANIFEST_FILENAME).exists()
    }

    /// Persist a snapshot, replacing the current one.
    ///
    /// Everything is written to a staging directory first and then renamed
    /// into place, so a reader never sees a half-written snapshot.
    pub fn save(
        &self,
        passages: &[Passage],
        dense: &FlatVectorIndex,
        lexical: &Bm25Index,
        embedding_model: &str,
    ) -> Result<IndexManifest, RagError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| RagError::index_io(&self.root, format!("Failed to create index directory: {e}")))?;

        let staging = self
            .root
            .join(format!(".staging-{}", uuid::Uuid::new_v4()));
        let manifest = match write_snapshot(&staging, passages, dense, lexical, embedding_model) {
            Ok(manifest) => manifest,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(
                        "Failed to remove staging directory {}: {}",
                        staging.display(),
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        let current = self.current_dir();
        let retired = self
            .root
            .join(format!(".retired-{}", uuid::Uuid::new_v4()));
        let had_current = current.exists();
        if had_current {
            fs::rename(&current, &retired)
                .map_err(|e| RagError::index_io(&current, format!("Failed to retire old index: {e}")))?;
        }
        if let Err(e) = fs::rename(&staging, &current) {
            // Put the previous snapshot back so the store stays loadable
            if had_current {
                let _ = fs::rename(&retired, &current);
            }
            return Err(RagError::index_io(
                &current,
                format!("Failed to activate new index: {e}"),
            ));
        }
        if had_current {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("Failed to remove retired index {}: {}", retired.display(), e);
            }
        }

        info!(
            "Saved index to {}: {} passages",
            current.display(),
            manifest.passage_count
        );
        Ok(manifest)
    }

    /// Load the current snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot exists. A snapshot whose parts
    /// disagree with each other or with the manifest is an error.
    pub fn load(&self) -> Result<Option<(IndexManifest, IndexSnapshot)>, RagError> {
        let current = self.current_dir();
        let manifest_path = current.join(MANIFEST_FILENAME);
        if !manifest_path.exists() {
            debug!("No index manifest at {}", manifest_path.display());
            return Ok(None);
        }

        let manifest: IndexManifest = read_json(&manifest_path)?;
        if manifest.version != IndexManifest::CURRENT_VERSION {
            return Err(RagError::index_parse(
                &manifest_path,
                format!(
                    "Index version mismatch: found {}, expected {}",
                    manifest.version,
                    IndexManifest::CURRENT_VERSION
                ),
            ));
        }

        let passages: Vec<Passage> = read_json(&current.join(PASSAGES_FILENAME))?;
        let dense = FlatVectorIndex::load(&current.join(VECTORS_DIR_NAME))?;
        let lexical = load_bm25_index(&current)?;

        if passages.len() != manifest.passage_count {
            return Err(RagError::index_parse(
                &manifest_path,
                format!(
                    "Manifest records {} passages but {} were stored",
                    manifest.passage_count,
                    passages.len()
                ),
            ));
        }

        let snapshot = IndexSnapshot::new(passages, Arc::new(dense), Arc::new(lexical))
            .map_err(|e| RagError::index_parse(&current, e.to_string()))?;

        info!(
            "Loaded index from {}: {} passages",
            current.display(),
            snapshot.len()
        );
        Ok(Some((manifest, snapshot)))
    }

    /// Remove the persisted snapshot, if any.
    pub fn clear(&self) -> Result<(), RagError> {
        let current = self.current_dir();
        if current.exists() {
            fs::remove_dir_all(&current)
                .map_err(|e| RagError::index_io(&current, format!("Failed to delete index: {e}")))?;
            info!("Deleted index at {}", current.display());
        }
        Ok(())
    }
}

fn write_snapshot(
    dir: &Path,
    passages: &[Passage],
    dense: &FlatVectorIndex,
    lexical: &Bm25Index,
    embedding_model: &str,
) -> Result<IndexManifest, RagError> {
    fs::create_dir_all(dir)
        .map_err(|e| RagError::index_io(dir, format!("Failed to create staging directory: {e}")))?;

    write_json(&dir.join(PASSAGES_FILENAME), &passages)?;
    dense.save(&dir.join(VECTORS_DIR_NAME))?;
    save_bm25_index(lexical, dir)?;

    let manifest = IndexManifest {
        version: IndexManifest::CURRENT_VERSION,
        passage_count: passages.len(),
        dimension: dense.dimension(),
        metric: dense.metric(),
        embedding_model: embedding_model.to_string(),
        built_at: chrono::Utc::now().to_rfc3339(),
    };
    write_json(&dir.join(MANIFEST_FILENAME), &manifest)?;
    Ok(manifest)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RagError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RagError::index_parse(path, format!("Failed to serialize: {e}")))?;
    fs::write(path, json).map_err(|e| RagError::index_io(path, format!("Failed to write: {e}")))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, RagError> {
    let content = fs::read_to_string(path)
        .map_err(|e| RagError::index_io(path, format!("Failed to read: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| RagError::index_parse(path, format!("Failed to parse: {e}")))
}
