//! Infrastructure adapters: the relational store and telemetry.

pub mod db;
mod error;
pub mod telemetry;

pub use error::InfraError;
