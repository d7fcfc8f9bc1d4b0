//! Rivista cache system.
//!
//! A namespaced, tagged, TTL'd cache over the shared key-value store, plus
//! the mutation event machinery that keeps it and the inverted index
//! consistent with the relational content store:
//!
//! - [`SmartCache`]: generic set/get/delete with tag and namespace
//!   invalidation; never surfaces store failures to callers.
//! - [`DomainCache`]: entity-typed helpers with fixed namespace, tag, and
//!   TTL conventions per entity kind.
//! - [`EventQueue`]/[`ChangeConsumer`]/[`MutationHooks`]: an explicit
//!   in-process queue of content-change events, consumed in batches to run
//!   invalidation and index maintenance without ever failing the write that
//!   triggered them.

mod config;
mod consumer;
mod domain;
mod entry;
mod events;
mod hooks;
pub mod keys;
mod lock;
mod manager;

pub use config::CacheConfig;
pub use consumer::ChangeConsumer;
pub use domain::DomainCache;
pub use entry::{CacheEntry, CacheMeta};
pub use events::{ChangeEvent, Epoch, EventKind, EventQueue};
pub use hooks::MutationHooks;
pub use manager::{CacheHealth, CacheStats, NamespaceStats, SetOptions, SmartCache};
