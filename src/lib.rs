//! Rivista search and cache subsystem.
//!
//! The tiered machinery that makes editorial content discoverable quickly
//! and keeps results consistent through mutations:
//!
//! - [`kv`]: thin async store adapter; Redis in production, an in-memory
//!   fake in tests.
//! - [`cache`]: namespaced, tagged, TTL'd cache plus the change event queue
//!   and consumer that invalidate it.
//! - [`index`]: inverted index (snapshots, postings, orderings) built on
//!   the same store.
//! - [`search`]: the orchestrator resolving queries through
//!   cache → index → relational fallback.
//! - [`infra`]: Postgres content repository and telemetry bootstrap.
//!
//! The relational content store remains the source of truth; everything
//! here is derived state that self-heals on the next reindex.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod index;
pub mod infra;
pub mod kv;
pub mod search;
