//! dayvec - rolling, day-partitioned vector index
//!
//! Vectors inserted today land in today's partition; searches run over
//! every partition inside a retention window of `max_days` calendar days,
//! today included. Partitions that age out are evicted from memory and
//! their files deleted. Each partition is persisted as an
//! `index_<YYYY-MM-DD>.vec` / `metadata_<YYYY-MM-DD>.meta` pair.
//!
//! # Quick Start
//!
//! ```ignore
//! use dayvec::{IndexConfig, IndexManager, Metadata, MetadataValue};
//!
//! let index = IndexManager::open(IndexConfig::new("./index").with_dimension(384))?;
//!
//! let mut meta = Metadata::new();
//! meta.insert("type".into(), MetadataValue::from("contact"));
//! let id = index.insert(&embedding, meta)?;
//!
//! for hit in index.search(&query, 10)? {
//!     println!("{} {}", hit.id, hit.distance);
//! }
//! ```
//!
//! # Architecture
//!
//! - `dayvec-core`: error type, metadata values, filters, identity types
//! - `dayvec-durability`: on-disk layout, partition codec, atomic writes
//! - `dayvec-engine`: partitions, registry, search backend, index manager

pub use dayvec_core::{
    metadata_from_json, metadata_to_json, IndexError, IndexResult, Metadata, MetadataFilter,
    MetadataValue, SearchHit, VectorId, DEFAULT_DIMENSION, DEFAULT_MAX_DAYS, MAX_DIMENSION,
};
pub use dayvec_durability::{
    LoadedPartition, PartitionCodec, PartitionView, StorageLayout, INDEX_MAGIC, INDEX_VERSION,
};
pub use dayvec_engine::{
    BruteForceBackend, Candidate, Clock, FixedClock, IndexConfig, IndexManager, IndexStats,
    LoadReport, LocalClock, Partition, PartitionRegistry, PartitionStats, SearchBackend, Timezone,
    UtcClock, CONFIG_FILE_NAME,
};
