//! # ragent-db
//!
//! Storage layer for ragent: the dense vector index behind hybrid retrieval.
//!
//! This crate keeps the on-disk and numeric work out of `ragent-core`:
//!
//! - Exact nearest-neighbour search over a flat in-memory matrix
//! - Metadata equality filters applied at search time
//! - bincode persistence with a JSON sidecar for compatibility checks
//!
//! ## Architecture
//!
//! ```text
//! ragent-cli → ragent-core → (traits)
//!                   ↑
//!              ragent-db    (dense vector index)
//!              ragent-model (embedding / rerank / chat clients)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use ragent_db::vector::{FlatVectorIndex, VectorMetric, VectorRecord};
//!
//! let mut index = FlatVectorIndex::new(384, VectorMetric::Cosine);
//! index.insert(records)?;
//! index.save(&dir)?;
//!
//! let results = index.search(&embedding, 50, None)?;
//! ```

pub mod error;
pub mod vector;

pub use error::{DbError, DbResult};
