//! Partition - one day's vectors and metadata
//!
//! Vectors are stored in a contiguous `Vec<f32>` for cache-friendly
//! distance computation. Layout: `[v0_dim0, ..., v0_dimN, v1_dim0, ...]`.
//! The ordinal of a vector is its row index and never changes.
//!
//! # Invariants
//!
//! - `data.len() == metadata.len() * dimension` at all times
//! - Rows are only ever appended, or removed from the tail by `rollback`

use chrono::NaiveDate;
use dayvec_core::{IndexError, IndexResult, Metadata};
use dayvec_durability::{LoadedPartition, PartitionView};

/// Saved position to roll an append back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    len: usize,
    dirty: bool,
}

/// In-memory store for one calendar day
#[derive(Debug)]
pub struct Partition {
    date: NaiveDate,
    dimension: usize,
    data: Vec<f32>,
    metadata: Vec<Metadata>,
    /// Mutated since the last successful save
    dirty: bool,
    /// Evicted; files are deleted or about to be, no further saves allowed
    retired: bool,
}

impl Partition {
    /// Create an empty partition
    pub fn new(date: NaiveDate, dimension: usize) -> Self {
        Partition {
            date,
            dimension,
            data: Vec::new(),
            metadata: Vec::new(),
            dirty: false,
            retired: false,
        }
    }

    /// Rebuild a partition read by the codec
    ///
    /// The codec has already checked dimension and counts; this only
    /// re-asserts the row invariant.
    pub fn from_loaded(loaded: LoadedPartition, dimension: usize) -> IndexResult<Self> {
        if loaded.vectors.len() != loaded.metadata.len() * dimension {
            return Err(IndexError::corrupt(
                loaded.date,
                format!(
                    "{} floats cannot hold {} vectors of dimension {}",
                    loaded.vectors.len(),
                    loaded.metadata.len(),
                    dimension
                ),
            ));
        }
        Ok(Partition {
            date: loaded.date,
            dimension,
            data: loaded.vectors,
            metadata: loaded.metadata,
            dirty: false,
            retired: false,
        })
    }

    /// Partition date
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Has unsaved mutations
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a successful save
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Has been evicted
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Mark as evicted
    pub fn retire(&mut self) {
        self.retired = true;
    }

    /// Current position, for rolling back a failed append
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.len(),
            dirty: self.dirty,
        }
    }

    /// Drop every row appended after `checkpoint`
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        if checkpoint.len < self.len() {
            self.data.truncate(checkpoint.len * self.dimension);
            self.metadata.truncate(checkpoint.len);
        }
        self.dirty = checkpoint.dirty;
    }

    /// Append a vector and its metadata, returning the new ordinal
    ///
    /// Fails with `DimensionMismatch` without modifying the partition.
    pub fn push(&mut self, vector: &[f32], metadata: Metadata) -> IndexResult<u64> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        let ordinal = self.len() as u64;
        self.data.extend_from_slice(vector);
        self.metadata.push(metadata);
        self.dirty = true;
        Ok(ordinal)
    }

    /// Get a vector by ordinal
    pub fn vector(&self, ordinal: u64) -> Option<&[f32]> {
        let i = usize::try_from(ordinal).ok()?;
        if i >= self.len() {
            return None;
        }
        let start = i * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Get the metadata of a vector by ordinal
    pub fn metadata(&self, ordinal: u64) -> Option<&Metadata> {
        self.metadata.get(usize::try_from(ordinal).ok()?)
    }

    /// Iterate `(ordinal, vector, metadata)` in ordinal order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[f32], &Metadata)> {
        // chunks_exact panics on a zero chunk size
        let chunk = self.dimension.max(1);
        self.data
            .chunks_exact(chunk)
            .zip(self.metadata.iter())
            .enumerate()
            .map(|(i, (v, m))| (i as u64, v, m))
    }

    /// Borrowed view for the codec
    pub fn view(&self) -> PartitionView<'_> {
        PartitionView {
            date: self.date,
            vectors: &self.data,
            metadata: &self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayvec_core::MetadataValue;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn meta(i: i64) -> Metadata {
        let mut m = Metadata::new();
        m.insert("id".into(), MetadataValue::Integer(i));
        m
    }

    #[test]
    fn test_push_assigns_sequential_ordinals() {
        let mut p = Partition::new(day(), 2);
        assert_eq!(p.push(&[1.0, 2.0], meta(0)).unwrap(), 0);
        assert_eq!(p.push(&[3.0, 4.0], meta(1)).unwrap(), 1);
        assert_eq!(p.len(), 2);
        assert!(p.is_dirty());
        assert_eq!(p.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(p.metadata(0), Some(&meta(0)));
        assert_eq!(p.vector(2), None);
    }

    #[test]
    fn test_push_wrong_dimension_leaves_partition_unchanged() {
        let mut p = Partition::new(day(), 4);
        let err = p.push(&[1.0, 2.0, 3.0], meta(0)).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 4,
                got: 3
            }
        ));
        assert!(p.is_empty());
        assert!(!p.is_dirty());
    }

    #[test]
    fn test_rollback_restores_length_and_dirty_flag() {
        let mut p = Partition::new(day(), 1);
        p.push(&[1.0], meta(0)).unwrap();
        p.mark_clean();

        let checkpoint = p.checkpoint();
        p.push(&[2.0], meta(1)).unwrap();
        p.push(&[3.0], meta(2)).unwrap();
        p.rollback(checkpoint);

        assert_eq!(p.len(), 1);
        assert_eq!(p.view().vectors, &[1.0]);
        assert!(!p.is_dirty());
    }

    #[test]
    fn test_iter_yields_rows_in_order() {
        let mut p = Partition::new(day(), 2);
        p.push(&[1.0, 1.0], meta(10)).unwrap();
        p.push(&[2.0, 2.0], meta(20)).unwrap();

        let rows: Vec<_> = p.iter().map(|(i, v, m)| (i, v.to_vec(), m.clone())).collect();
        assert_eq!(
            rows,
            vec![(0, vec![1.0, 1.0], meta(10)), (1, vec![2.0, 2.0], meta(20))]
        );
    }

    #[test]
    fn test_from_loaded_rejects_misaligned_rows() {
        let loaded = LoadedPartition {
            date: day(),
            vectors: vec![1.0, 2.0, 3.0],
            metadata: vec![meta(0)],
        };
        assert!(Partition::from_loaded(loaded, 2).unwrap_err().is_corruption());
    }

    #[test]
    fn test_retire() {
        let mut p = Partition::new(day(), 1);
        assert!(!p.is_retired());
        p.retire();
        assert!(p.is_retired());
    }
}
