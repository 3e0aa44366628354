//! Dimension and retention bounds
//!
//! Defaults match the sentence-embedding models the index is fed from
//! (384-dimensional output) and a one-week retention window.

/// Default embedding dimension
pub const DEFAULT_DIMENSION: usize = 384;

/// Largest accepted embedding dimension
pub const MAX_DIMENSION: usize = 65_536;

/// Default retention window length in days
pub const DEFAULT_MAX_DAYS: u32 = 7;
