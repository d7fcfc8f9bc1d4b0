//! Core value types shared by the index, cache, and search tiers.

mod document;
mod error;

pub use document::{Document, SortOrder};
pub use error::DomainError;
