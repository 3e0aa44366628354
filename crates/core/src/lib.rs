//! Core types for dayvec
//!
//! This crate defines the foundational types shared by the durability and
//! engine crates:
//! - Error: `IndexError` hierarchy and `IndexResult` alias
//! - Types: `VectorId` (date, ordinal) and `SearchHit`
//! - Value: `MetadataValue` and the `Metadata` record attached to every vector
//! - Filter: equality-based `MetadataFilter` for filtered search
//! - Limits: dimension and retention bounds

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod limits;
pub mod types;
pub mod value;

pub use error::{IndexError, IndexResult};
pub use filter::MetadataFilter;
pub use limits::{DEFAULT_DIMENSION, DEFAULT_MAX_DAYS, MAX_DIMENSION};
pub use types::{SearchHit, VectorId};
pub use value::{metadata_from_json, metadata_to_json, Metadata, MetadataValue};
