//! Partition codec
//!
//! One partition is persisted as two files, each replaced atomically.
//!
//! ## Index File Format (Version 1)
//!
//! ```text
//! [Magic: "DVIX"]
//! [Version: u32 LE]
//! [Dimension: u32 LE]
//! [Count: u64 LE]
//! [Vectors: count * dimension * f32 LE, row-major]
//! [CRC32: u32 LE over everything above]
//! ```
//!
//! ## Metadata File Format (Version 1)
//!
//! MessagePack map `{ version, count, records }` where `records[i]` belongs to
//! vector `i` of the index file.
//!
//! ## Design Notes
//!
//! 1. **Bit-exact**: embeddings are written as raw IEEE-754 bits; NaN payloads
//!    and signed zeros survive a round-trip.
//! 2. **Paired counts**: both files carry their own count, and `load` refuses a
//!    pair whose counts disagree. A crash between the two renames therefore
//!    shows up as `CorruptPartition`, never as misaligned metadata.
//! 3. **Failed saves restore**: `save` snapshots both files first and writes
//!    the snapshot back if either replacement fails.

use crate::atomic::{remove_if_exists, write_atomic};
use crate::layout::StorageLayout;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::NaiveDate;
use dayvec_core::{IndexError, IndexResult, Metadata};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Magic bytes at the start of every index file
pub const INDEX_MAGIC: &[u8; 4] = b"DVIX";

/// Current index file format version
pub const INDEX_VERSION: u32 = 1;

/// Current metadata file format version
pub const METADATA_VERSION: u32 = 1;

/// magic + version + dimension + count
const INDEX_HEADER_SIZE: usize = 4 + 4 + 4 + 8;
const CRC_SIZE: usize = 4;

/// Borrowed view of a partition, as handed to `save`
#[derive(Debug, Clone, Copy)]
pub struct PartitionView<'a> {
    /// Partition date
    pub date: NaiveDate,
    /// Row-major vectors, `metadata.len() * dimension` floats
    pub vectors: &'a [f32],
    /// One record per vector
    pub metadata: &'a [Metadata],
}

/// Partition contents read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPartition {
    /// Partition date
    pub date: NaiveDate,
    /// Row-major vectors
    pub vectors: Vec<f32>,
    /// One record per vector
    pub metadata: Vec<Metadata>,
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    count: u64,
    records: Vec<Metadata>,
}

/// Reads and writes partitions of one dimension in one storage directory
#[derive(Debug, Clone)]
pub struct PartitionCodec {
    layout: StorageLayout,
    dimension: usize,
}

impl PartitionCodec {
    /// Create a codec for `dimension`-length vectors
    pub fn new(layout: StorageLayout, dimension: usize) -> Self {
        PartitionCodec { layout, dimension }
    }

    /// Storage layout
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Persist a partition
    ///
    /// Both payloads are encoded before any file is touched, so an encoding
    /// failure leaves disk untouched. The metadata file is replaced first,
    /// then the index file. If either write fails, both files are put back
    /// to their previous contents before the error is returned, so a
    /// reported failure leaves the last successful save on disk.
    pub fn save(&self, partition: PartitionView<'_>) -> IndexResult<()> {
        let count = partition.metadata.len();
        if partition.vectors.len() != count * self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: count * self.dimension,
                got: partition.vectors.len(),
            });
        }

        let index_bytes = encode_index(self.dimension, partition.vectors)?;
        let metadata_bytes = encode_metadata(partition.metadata)?;

        let metadata_path = self.layout.metadata_path(partition.date);
        let index_path = self.layout.index_path(partition.date);
        let previous_metadata = read_previous(&metadata_path)?;
        let previous_index = read_previous(&index_path)?;

        if let Err(e) = write_atomic(&metadata_path, &metadata_bytes) {
            restore(&metadata_path, previous_metadata.as_deref());
            return Err(e);
        }
        if let Err(e) = write_atomic(&index_path, &index_bytes) {
            restore(&index_path, previous_index.as_deref());
            restore(&metadata_path, previous_metadata.as_deref());
            return Err(e);
        }

        debug!(
            date = %partition.date,
            count,
            index_bytes = index_bytes.len(),
            metadata_bytes = metadata_bytes.len(),
            "Partition saved"
        );
        Ok(())
    }

    /// Read a partition back
    ///
    /// Missing files surface as `StorageIo`; anything that is present but
    /// unreadable surfaces as `CorruptPartition`.
    pub fn load(&self, date: NaiveDate) -> IndexResult<LoadedPartition> {
        let index_path = self.layout.index_path(date);
        let metadata_path = self.layout.metadata_path(date);

        let index_bytes = fs::read(&index_path).map_err(|e| IndexError::io(&index_path, e))?;
        let metadata_bytes =
            fs::read(&metadata_path).map_err(|e| IndexError::io(&metadata_path, e))?;

        let (vectors, vector_count) = decode_index(&index_bytes, self.dimension)
            .map_err(|reason| IndexError::corrupt(date, format!("index file: {}", reason)))?;
        let metadata = decode_metadata(&metadata_bytes)
            .map_err(|reason| IndexError::corrupt(date, format!("metadata file: {}", reason)))?;

        if vector_count != metadata.len() {
            return Err(IndexError::corrupt(
                date,
                format!(
                    "vector count {} does not match metadata count {}",
                    vector_count,
                    metadata.len()
                ),
            ));
        }

        debug!(date = %date, count = vector_count, "Partition loaded");
        Ok(LoadedPartition {
            date,
            vectors,
            metadata,
        })
    }

    /// Delete both files of a partition
    ///
    /// Returns whether anything was removed.
    pub fn delete(&self, date: NaiveDate) -> IndexResult<bool> {
        let removed_meta = remove_if_exists(&self.layout.metadata_path(date))?;
        let removed_index = remove_if_exists(&self.layout.index_path(date))?;
        Ok(removed_meta || removed_index)
    }
}

/// Current contents of `path`, or `None` if it does not exist
fn read_previous(path: &Path) -> IndexResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

/// Put `path` back to `previous` after a failed save (best effort)
fn restore(path: &Path, previous: Option<&[u8]>) {
    let result = match previous {
        Some(bytes) => write_atomic(path, bytes),
        None => remove_if_exists(path).map(|_| ()),
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "Restored file after failed save"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to restore file after failed save"),
    }
}

/// Encode vectors into the index file format
pub fn encode_index(dimension: usize, vectors: &[f32]) -> IndexResult<Vec<u8>> {
    let count = if dimension == 0 {
        0
    } else {
        vectors.len() / dimension
    };
    let dim32 = u32::try_from(dimension)
        .map_err(|_| IndexError::Serialization(format!("dimension {} too large", dimension)))?;

    let mut buf = Vec::with_capacity(INDEX_HEADER_SIZE + vectors.len() * 4 + CRC_SIZE);
    buf.extend_from_slice(INDEX_MAGIC);
    put_le(&mut buf, |b| b.write_u32::<LittleEndian>(INDEX_VERSION))?;
    put_le(&mut buf, |b| b.write_u32::<LittleEndian>(dim32))?;
    put_le(&mut buf, |b| b.write_u64::<LittleEndian>(count as u64))?;
    for &value in vectors {
        put_le(&mut buf, |b| b.write_f32::<LittleEndian>(value))?;
    }

    let crc = crc32fast::hash(&buf);
    put_le(&mut buf, |b| b.write_u32::<LittleEndian>(crc))?;
    Ok(buf)
}

fn put_le(
    buf: &mut Vec<u8>,
    write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
) -> IndexResult<()> {
    write(buf).map_err(|e| IndexError::Serialization(e.to_string()))
}

/// Decode an index file, checking it against `dimension`
///
/// Returns the row-major vectors and the vector count.
pub fn decode_index(data: &[u8], dimension: usize) -> Result<(Vec<f32>, usize), String> {
    if data.len() < INDEX_HEADER_SIZE + CRC_SIZE {
        return Err(format!(
            "too short: {} bytes, need at least {}",
            data.len(),
            INDEX_HEADER_SIZE + CRC_SIZE
        ));
    }

    let (content, crc_bytes) = data.split_at(data.len() - CRC_SIZE);
    let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed_crc = crc32fast::hash(content);
    if stored_crc != computed_crc {
        return Err(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, computed_crc
        ));
    }

    let mut cursor = Cursor::new(content);
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(|e| e.to_string())?;
    if &magic != INDEX_MAGIC {
        return Err(format!("bad magic {:?}", magic));
    }

    let version = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| e.to_string())?;
    if version != INDEX_VERSION {
        return Err(format!("unsupported version {}", version));
    }

    let stored_dimension = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| e.to_string())? as usize;
    if stored_dimension != dimension {
        return Err(format!(
            "dimension {} does not match configured dimension {}",
            stored_dimension, dimension
        ));
    }

    let count = cursor
        .read_u64::<LittleEndian>()
        .map_err(|e| e.to_string())? as usize;
    let expected_floats = count
        .checked_mul(dimension)
        .ok_or_else(|| format!("count {} overflows", count))?;
    let payload = content.len() - INDEX_HEADER_SIZE;
    if payload != expected_floats * 4 {
        return Err(format!(
            "payload is {} bytes, expected {} for {} vectors",
            payload,
            expected_floats * 4,
            count
        ));
    }

    let mut vectors = vec![0.0f32; expected_floats];
    cursor
        .read_f32_into::<LittleEndian>(&mut vectors)
        .map_err(|e| e.to_string())?;

    Ok((vectors, count))
}

/// Encode metadata records into the metadata file format
pub fn encode_metadata(records: &[Metadata]) -> IndexResult<Vec<u8>> {
    let file = MetadataFile {
        version: METADATA_VERSION,
        count: records.len() as u64,
        records: records.to_vec(),
    };
    rmp_serde::to_vec_named(&file).map_err(|e| IndexError::Serialization(e.to_string()))
}

/// Decode a metadata file
pub fn decode_metadata(data: &[u8]) -> Result<Vec<Metadata>, String> {
    let file: MetadataFile = rmp_serde::from_slice(data).map_err(|e| e.to_string())?;
    if file.version != METADATA_VERSION {
        return Err(format!("unsupported version {}", file.version));
    }
    if file.count != file.records.len() as u64 {
        return Err(format!(
            "header count {} does not match {} records",
            file.count,
            file.records.len()
        ));
    }
    Ok(file.records)
}
