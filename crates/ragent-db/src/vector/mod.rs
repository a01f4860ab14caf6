//! Dense vector index for ragent's similarity search.
//!
//! The index is a flat matrix scored exhaustively. Corpora handled by a single
//! ragent process are small enough that exact search beats the bookkeeping of
//! an ANN structure, and results stay reproducible across rebuilds.
//!
//! ## Usage
//!
//! ```ignore
//! use ragent_db::vector::{FlatVectorIndex, MetadataFilter, VectorMetric};
//!
//! let index = FlatVectorIndex::load(&dir)?;
//! let filter = MetadataFilter::new().with("source", "doc1");
//! let results = index.search(&embedding, 10, Some(&filter))?;
//! ```

mod flat;
mod meta;
mod metadata;
mod traits;

pub use flat::FlatVectorIndex;
pub use meta::{VectorIndexMeta, INDEX_FILENAME, INDEX_META_FILENAME};
pub use metadata::{Metadata, MetadataFilter, MetadataValue};
pub use traits::{VectorIndexBackend, VectorMetric, VectorRecord, VectorSearchResult};
