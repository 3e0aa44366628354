//! Identity and result types

use crate::value::Metadata;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global identity of a stored vector
///
/// Addressed by the partition's calendar date and the vector's ordinal
/// position inside that partition. Stable for as long as the partition
/// exists on disk; meaningless once it has been evicted.
///
/// Ordering is `(date, ordinal)` ascending, which is also the tie-break
/// order for equal search distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VectorId {
    /// Partition date
    pub date: NaiveDate,
    /// Position within the partition
    pub ordinal: u64,
}

impl VectorId {
    /// Create a new VectorId
    pub fn new(date: NaiveDate, ordinal: u64) -> Self {
        VectorId { date, ordinal }
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.date, self.ordinal)
    }
}

/// A single search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Where the vector lives
    pub id: VectorId,
    /// Squared Euclidean distance to the query (lower = closer)
    pub distance: f32,
    /// The metadata stored alongside the vector, returned verbatim
    pub metadata: Metadata,
}
