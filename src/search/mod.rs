//! Tiered search orchestration: cache, then index, then relational fallback.

mod config;
mod service;

pub use config::SearchConfig;
pub use service::{PostHit, ReindexOutcome, SearchResponse, SearchService, SearchSource};
