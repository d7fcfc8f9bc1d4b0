//! Inverted index over key-value primitives.
//!
//! Maintains document snapshots, per-token posting sets, global and
//! per-category orderings, and serves keyword queries with AND semantics.
//! Postings are written on index and tolerated stale afterwards; queries
//! filter candidates whose snapshot is gone.

mod config;
mod engine;
pub mod keys;
mod tokenize;

pub use config::IndexConfig;
pub use engine::{IndexEngine, IndexError, QueryPage, ReindexStats};
pub use tokenize::tokenize;
