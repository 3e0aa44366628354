//! Rolling index engine for dayvec
//!
//! This crate orchestrates the lower layers:
//! - Partition: one day's vectors and metadata in memory
//! - Backend: per-partition top-k selection behind a swappable trait
//! - Registry: resident partitions keyed by date, retention enforcement
//! - Manager: insert routing, fan-out search and merge, rollover
//! - Clock: the source of "today", injectable for tests
//! - Config: construction parameters, loadable from TOML

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod distance;
pub mod manager;
pub mod partition;
pub mod registry;

pub use backend::{BruteForceBackend, Candidate, SearchBackend};
pub use clock::{Clock, FixedClock, LocalClock, UtcClock};
pub use config::{IndexConfig, Timezone, CONFIG_FILE_NAME};
pub use manager::{IndexManager, IndexStats, PartitionStats};
pub use partition::{Checkpoint, Partition};
pub use registry::{LoadReport, PartitionRegistry, Rollover, SharedPartition};
