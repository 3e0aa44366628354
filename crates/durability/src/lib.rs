//! Durability layer for dayvec
//!
//! This crate owns everything that touches the storage directory:
//! - Layout: file naming and directory scanning (`index_<date>.vec`,
//!   `metadata_<date>.meta`)
//! - Atomic writes: write-fsync-rename with directory sync
//! - Codec: binary vector file and MessagePack metadata file for one partition

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod codec;
pub mod layout;

pub use atomic::{remove_if_exists, temp_path_for, write_atomic, TEMP_SUFFIX};
pub use codec::{LoadedPartition, PartitionCodec, PartitionView, INDEX_MAGIC, INDEX_VERSION};
pub use layout::{DirectoryScan, FilePair, ParsedFileName, PartitionFileKind, StorageLayout};
