//! Index Manager
//!
//! Public entry point. Routes inserts to today's partition, fans searches
//! out over every resident partition and merges the local results, and
//! drives day rollover from the injected `Clock`.
//!
//! # Example
//!
//! ```ignore
//! let config = IndexConfig::new("/var/lib/crm-index").with_dimension(4);
//! let index = IndexManager::open(config)?;
//!
//! let id = index.insert(&[0.1, 0.2, 0.3, 0.4], metadata)?;
//! let hits = index.search(&[0.1, 0.2, 0.3, 0.4], 10)?;
//! ```

use crate::backend::{BruteForceBackend, SearchBackend};
use crate::clock::Clock;
use crate::config::IndexConfig;
use crate::distance::cmp_distance;
use crate::registry::{PartitionRegistry, SharedPartition};
use chrono::NaiveDate;
use dayvec_core::{IndexError, IndexResult, Metadata, MetadataFilter, SearchHit, VectorId};
use dayvec_durability::{PartitionCodec, StorageLayout};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector count of one resident partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Partition date
    pub date: NaiveDate,
    /// Number of vectors
    pub vectors: usize,
}

/// Snapshot of the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Configured vector dimension
    pub dimension: usize,
    /// Retention window length
    pub max_days: u32,
    /// Last day observed by a rollover check
    pub today: NaiveDate,
    /// Resident partitions, ascending by date
    pub partitions: Vec<PartitionStats>,
    /// Sum of all partition sizes
    pub total_vectors: usize,
}

/// Rolling day-partitioned vector index
///
/// `Send + Sync`; share it across threads with `Arc`.
pub struct IndexManager {
    config: IndexConfig,
    clock: Arc<dyn Clock>,
    registry: PartitionRegistry,
    backend: Box<dyn SearchBackend>,
}

impl IndexManager {
    /// Open an index using the clock selected by `config.timezone`
    pub fn open(config: IndexConfig) -> IndexResult<Self> {
        let clock = config.timezone.clock();
        Self::open_with_clock(config, clock)
    }

    /// Open an index with an explicit clock
    ///
    /// Validates the configuration, prepares the storage directory and
    /// loads every partition inside the retention window.
    ///
    /// # Errors
    ///
    /// `Config` for invalid parameters or an unusable storage directory,
    /// `StorageIo` if the directory cannot be listed. Individual bad
    /// partitions are skipped, not reported.
    pub fn open_with_clock(config: IndexConfig, clock: Arc<dyn Clock>) -> IndexResult<Self> {
        config.validate()?;
        config.prepare_storage()?;

        let today = clock.today();
        let codec = PartitionCodec::new(
            StorageLayout::new(config.storage_dir.clone()),
            config.dimension,
        );
        let registry =
            PartitionRegistry::new(codec, config.max_days, config.delete_expired, today)?;
        let report = registry.load_resident(today)?;

        info!(
            storage_dir = %config.storage_dir.display(),
            dimension = config.dimension,
            max_days = config.max_days,
            resident = report.loaded.len(),
            today = %today,
            "Index opened"
        );

        Ok(IndexManager {
            config,
            clock,
            registry,
            backend: Box::new(BruteForceBackend::new()),
        })
    }

    /// Replace the per-partition search backend
    pub fn with_backend(mut self, backend: Box<dyn SearchBackend>) -> Self {
        debug!(backend = backend.name(), "Search backend replaced");
        self.backend = backend;
        self
    }

    /// Configuration the index was opened with
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Vector dimension
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Resident dates, ascending
    pub fn resident_dates(&self) -> Vec<NaiveDate> {
        self.registry.resident_dates()
    }

    fn check_dimension(&self, vector: &[f32]) -> IndexResult<()> {
        if vector.len() != self.config.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Append one vector to today's partition and persist it
    ///
    /// The partition is saved before this returns. If the save fails the
    /// append is undone and the error returned.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `vector` has the wrong length
    /// - `StorageIo` / `Serialization` if the save fails
    /// - `PartitionEvicted` if today's partition was evicted concurrently, or
    ///   the day rolled over between reading the clock and locking the
    ///   partition
    pub fn insert(&self, vector: &[f32], metadata: Metadata) -> IndexResult<VectorId> {
        self.check_dimension(vector)?;
        let today = self.rollover_check();
        let partition = self.registry.resolve_today(today)?;

        let mut guard = partition.write();
        if guard.is_retired() {
            return Err(IndexError::PartitionEvicted { date: guard.date() });
        }

        let checkpoint = guard.checkpoint();
        let ordinal = guard.push(vector, metadata)?;
        if let Err(e) = self.registry.codec().save(guard.view()) {
            guard.rollback(checkpoint);
            warn!(date = %guard.date(), error = %e, "Save failed, insert rolled back");
            return Err(e);
        }
        guard.mark_clean();

        debug!(date = %guard.date(), ordinal, "Inserted vector");
        Ok(VectorId::new(guard.date(), ordinal))
    }

    /// Append several vectors to today's partition with a single save
    ///
    /// All-or-nothing: every vector is checked before any is appended, and
    /// a failed save removes the whole batch.
    pub fn insert_batch(&self, items: Vec<(Vec<f32>, Metadata)>) -> IndexResult<Vec<VectorId>> {
        for (vector, _) in &items {
            self.check_dimension(vector)?;
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let today = self.rollover_check();
        let partition = self.registry.resolve_today(today)?;

        let mut guard = partition.write();
        let date = guard.date();
        if guard.is_retired() {
            return Err(IndexError::PartitionEvicted { date });
        }

        let checkpoint = guard.checkpoint();
        let mut ids = Vec::with_capacity(items.len());
        for (vector, metadata) in items {
            match guard.push(&vector, metadata) {
                Ok(ordinal) => ids.push(VectorId::new(date, ordinal)),
                Err(e) => {
                    guard.rollback(checkpoint);
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.registry.codec().save(guard.view()) {
            guard.rollback(checkpoint);
            warn!(date = %date, count = ids.len(), error = %e, "Save failed, batch rolled back");
            return Err(e);
        }
        guard.mark_clean();

        debug!(date = %date, count = ids.len(), "Inserted batch");
        Ok(ids)
    }

    /// The `k` nearest vectors across every resident partition
    ///
    /// Ordered by ascending squared Euclidean distance; equal distances by
    /// ascending `(date, ordinal)`. Returns fewer than `k` hits when fewer
    /// vectors are resident.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for a wrong-length query, `InvalidK` if `k == 0`.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        self.search_inner(query, k, None)
    }

    /// Like `search`, but only vectors whose metadata matches `filter`
    /// are candidates
    pub fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> IndexResult<Vec<SearchHit>> {
        let filter = if filter.is_empty() { None } else { Some(filter) };
        self.search_inner(query, k, filter)
    }

    fn search_inner(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> IndexResult<Vec<SearchHit>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Err(IndexError::InvalidK { k });
        }
        self.rollover_check();

        let mut hits = Vec::new();
        for (date, partition) in self.registry.resident_partitions() {
            let guard = partition.read();
            // Evicted between the snapshot and the lock
            if guard.is_retired() {
                continue;
            }
            for candidate in self.backend.top_k(&guard, query, k, filter) {
                let Some(metadata) = guard.metadata(candidate.ordinal) else {
                    continue;
                };
                hits.push(SearchHit {
                    id: VectorId::new(date, candidate.ordinal),
                    distance: candidate.distance,
                    metadata: metadata.clone(),
                });
            }
        }

        hits.sort_by(|a, b| cmp_distance(a.distance, b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    /// Vector and metadata stored under `id`, if still resident
    pub fn get(&self, id: VectorId) -> Option<(Vec<f32>, Metadata)> {
        let partition = self.registry.get(id.date)?;
        let guard = partition.read();
        if guard.is_retired() {
            return None;
        }
        let vector = guard.vector(id.ordinal)?.to_vec();
        let metadata = guard.metadata(id.ordinal)?.clone();
        Some((vector, metadata))
    }

    /// Read the clock and roll over if the day has advanced
    ///
    /// Returns the effective day. Runs implicitly at the start of every
    /// insert and search.
    pub fn rollover_check(&self) -> NaiveDate {
        self.registry.rollover_check(self.clock.today()).today
    }

    /// Evict every partition outside the window ending today
    ///
    /// Same as the implicit rollover check, but returns the evicted dates.
    /// Nothing behind the window is ever resident on the last day seen, so
    /// a second call on the same day returns nothing.
    pub fn evict_expired(&self) -> Vec<NaiveDate> {
        self.registry.rollover_check(self.clock.today()).evicted
    }

    /// Persist every resident partition with unsaved changes
    ///
    /// Returns the number of partitions written.
    pub fn save_all(&self) -> IndexResult<usize> {
        let mut saved = 0;
        for (_, partition) in self.registry.resident_partitions() {
            if self.save_partition(&partition)? {
                saved += 1;
            }
        }
        if saved > 0 {
            info!(partitions = saved, "Saved dirty partitions");
        }
        Ok(saved)
    }

    fn save_partition(&self, partition: &SharedPartition) -> IndexResult<bool> {
        let mut guard = partition.write();
        if guard.is_retired() || guard.is_empty() || !guard.is_dirty() {
            return Ok(false);
        }
        self.registry.codec().save(guard.view())?;
        guard.mark_clean();
        Ok(true)
    }

    /// Resident partition sizes
    pub fn stats(&self) -> IndexStats {
        let partitions: Vec<PartitionStats> = self
            .registry
            .resident_partitions()
            .into_iter()
            .map(|(date, p)| PartitionStats {
                date,
                vectors: p.read().len(),
            })
            .collect();
        let total_vectors = partitions.iter().map(|p| p.vectors).sum();

        IndexStats {
            dimension: self.config.dimension,
            max_days: self.config.max_days,
            today: self.registry.last_seen(),
            partitions,
            total_vectors,
        }
    }
}
