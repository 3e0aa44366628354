//! Partition Registry
//!
//! Owns the set of resident partitions and enforces the retention window
//! `[today - max_days + 1, today]`.
//!
//! # Locking
//!
//! Membership lives behind one short-held `Mutex`; each partition has its
//! own `RwLock`. The registry lock is never held while a partition lock is
//! taken or while disk I/O runs. Lock order is always registry, then
//! partition.
//!
//! Eviction detaches partitions under the registry lock, releases it, then
//! takes each detached partition's write lock. That waits out any insert or
//! search still holding the partition, after which the partition is marked
//! retired and its files are deleted.

use crate::partition::Partition;
use chrono::{Days, NaiveDate};
use dayvec_core::{IndexError, IndexResult};
use dayvec_durability::{remove_if_exists, PartitionCodec};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A partition shared between the registry and in-flight operations
pub type SharedPartition = Arc<RwLock<Partition>>;

/// What `load_resident` found on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Dates loaded into memory
    pub loaded: Vec<NaiveDate>,
    /// Dates older than the window whose files were deleted
    pub deleted: Vec<NaiveDate>,
    /// Dates left on disk but not loaded (incomplete, corrupt, future, or kept expired)
    pub skipped: Vec<NaiveDate>,
    /// Files with unparsable names
    pub unparsable: usize,
}

/// Outcome of a rollover check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollover {
    /// Effective date for the operation that triggered the check
    pub today: NaiveDate,
    /// Partitions evicted by this check
    pub evicted: Vec<NaiveDate>,
}

struct RegistryState {
    partitions: BTreeMap<NaiveDate, SharedPartition>,
    /// Last day observed by a rollover check; never moves backwards
    last_seen: NaiveDate,
    /// Cached partition for `last_seen`
    active: Option<(NaiveDate, SharedPartition)>,
}

/// Resident partitions keyed by calendar date
pub struct PartitionRegistry {
    codec: PartitionCodec,
    max_days: u32,
    delete_expired: bool,
    state: Mutex<RegistryState>,
}

/// First date inside the window ending at `today`
pub fn window_start(today: NaiveDate, max_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(max_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

impl PartitionRegistry {
    /// Create an empty registry
    ///
    /// # Errors
    ///
    /// `Config` if `max_days` is zero.
    pub fn new(
        codec: PartitionCodec,
        max_days: u32,
        delete_expired: bool,
        today: NaiveDate,
    ) -> IndexResult<Self> {
        if max_days == 0 {
            return Err(IndexError::Config(
                "max_days must be at least 1".to_string(),
            ));
        }
        Ok(PartitionRegistry {
            codec,
            max_days,
            delete_expired,
            state: Mutex::new(RegistryState {
                partitions: BTreeMap::new(),
                last_seen: today,
                active: None,
            }),
        })
    }

    /// Codec used for loading and deleting partitions
    pub fn codec(&self) -> &PartitionCodec {
        &self.codec
    }

    /// Retention window length
    pub fn max_days(&self) -> u32 {
        self.max_days
    }

    /// Last day seen by a rollover check or load
    pub fn last_seen(&self) -> NaiveDate {
        self.state.lock().last_seen
    }

    /// Scan the storage directory and load every partition inside the window
    ///
    /// Partitions older than the window are deleted (or left alone when
    /// `delete_expired` is off). Unparsable names, incomplete pairs and
    /// corrupt partitions are logged and skipped; only a failure to list the
    /// directory itself is fatal.
    pub fn load_resident(&self, today: NaiveDate) -> IndexResult<LoadReport> {
        let scan = self.codec.layout().scan()?;
        let start = window_start(today, self.max_days);
        let mut report = LoadReport {
            unparsable: scan.unparsable.len(),
            ..LoadReport::default()
        };

        for path in &scan.temp_files {
            warn!(path = %path.display(), "Removing temp file left by an interrupted save");
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove temp file");
            }
        }
        for path in &scan.unparsable {
            warn!(path = %path.display(), "Skipping partition file with unparsable date");
        }

        let mut loaded = BTreeMap::new();
        for (date, pair) in &scan.partitions {
            let date = *date;

            if date < start {
                if !self.delete_expired {
                    debug!(date = %date, "Leaving expired partition on disk");
                    report.skipped.push(date);
                    continue;
                }
                let mut failed = false;
                for path in pair.paths() {
                    if let Err(e) = remove_if_exists(path) {
                        warn!(path = %path.display(), error = %e, "Failed to delete expired partition file");
                        failed = true;
                    }
                }
                if failed {
                    report.skipped.push(date);
                } else {
                    info!(date = %date, "Deleted expired partition");
                    report.deleted.push(date);
                }
                continue;
            }

            if date > today {
                warn!(date = %date, today = %today, "Skipping partition dated in the future");
                report.skipped.push(date);
                continue;
            }

            if !pair.is_complete() {
                warn!(
                    date = %date,
                    has_index = pair.index.is_some(),
                    has_metadata = pair.metadata.is_some(),
                    "Skipping partition with a missing file"
                );
                report.skipped.push(date);
                continue;
            }

            match self
                .codec
                .load(date)
                .and_then(|l| Partition::from_loaded(l, self.codec.dimension()))
            {
                Ok(partition) => {
                    loaded.insert(date, Arc::new(RwLock::new(partition)));
                    report.loaded.push(date);
                }
                Err(e) => {
                    warn!(date = %date, error = %e, "Skipping unreadable partition");
                    report.skipped.push(date);
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.partitions.extend(loaded);
            if today > state.last_seen {
                state.last_seen = today;
            }
            state.active = None;
        }

        info!(
            loaded = report.loaded.len(),
            deleted = report.deleted.len(),
            skipped = report.skipped.len(),
            unparsable = report.unparsable,
            window_start = %start,
            today = %today,
            "Resident partitions loaded"
        );
        Ok(report)
    }

    /// Partition for `today`, created empty if absent
    ///
    /// Never touches disk.
    ///
    /// # Errors
    ///
    /// `PartitionEvicted` if `today` is behind the window ending at the last
    /// day seen, e.g. the clock was read just before another thread rolled
    /// over. No partition is ever registered behind the window.
    pub fn resolve_today(&self, today: NaiveDate) -> IndexResult<SharedPartition> {
        let mut state = self.state.lock();
        if let Some((date, partition)) = &state.active {
            if *date == today {
                return Ok(Arc::clone(partition));
            }
        }

        if today < window_start(state.last_seen, self.max_days) {
            debug!(date = %today, last_seen = %state.last_seen, "Refusing partition behind the window");
            return Err(IndexError::PartitionEvicted { date: today });
        }

        let dimension = self.codec.dimension();
        let partition = Arc::clone(
            state
                .partitions
                .entry(today)
                .or_insert_with(|| Arc::new(RwLock::new(Partition::new(today, dimension)))),
        );
        state.active = Some((today, Arc::clone(&partition)));
        Ok(partition)
    }

    /// Remove and delete every partition older than the window ending at `today`
    ///
    /// Returns the evicted dates, ascending. Calling it again for the same
    /// `today` evicts nothing.
    pub fn evict_expired(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let expired = {
            let mut state = self.state.lock();
            self.detach_expired(&mut state, today)
        };
        self.retire(expired)
    }

    /// Evict if `observed` is later than the last day seen
    ///
    /// A clock that moved backwards is ignored: the effective date stays at
    /// the last day seen, so no partition is ever created behind the window.
    pub fn rollover_check(&self, observed: NaiveDate) -> Rollover {
        let (today, expired) = {
            let mut state = self.state.lock();
            if observed < state.last_seen {
                warn!(
                    observed = %observed,
                    last_seen = %state.last_seen,
                    "Clock moved backwards; keeping last seen day"
                );
                return Rollover {
                    today: state.last_seen,
                    evicted: Vec::new(),
                };
            }
            if observed == state.last_seen {
                return Rollover {
                    today: observed,
                    evicted: Vec::new(),
                };
            }

            state.last_seen = observed;
            state.active = None;
            (observed, self.detach_expired(&mut state, observed))
        };

        let evicted = self.retire(expired);
        info!(today = %today, evicted = evicted.len(), "Day rollover");
        Rollover { today, evicted }
    }

    fn detach_expired(
        &self,
        state: &mut RegistryState,
        today: NaiveDate,
    ) -> Vec<(NaiveDate, SharedPartition)> {
        let start = window_start(today, self.max_days);
        let kept = state.partitions.split_off(&start);
        let expired = mem::replace(&mut state.partitions, kept);

        if state
            .active
            .as_ref()
            .is_some_and(|(date, _)| *date < start)
        {
            state.active = None;
        }
        expired.into_iter().collect()
    }

    fn retire(&self, expired: Vec<(NaiveDate, SharedPartition)>) -> Vec<NaiveDate> {
        let mut evicted = Vec::with_capacity(expired.len());
        for (date, partition) in expired {
            // Waits for in-flight inserts and searches on this partition
            let mut guard = partition.write();
            guard.retire();
            if self.delete_expired {
                match self.codec.delete(date) {
                    Ok(_) => info!(date = %date, vectors = guard.len(), "Evicted partition"),
                    Err(e) => warn!(date = %date, error = %e, "Evicted partition but failed to delete its files"),
                }
            } else {
                info!(date = %date, vectors = guard.len(), "Evicted partition, files kept");
            }
            evicted.push(date);
        }
        evicted
    }

    /// All resident partitions, ascending by date
    pub fn resident_partitions(&self) -> Vec<(NaiveDate, SharedPartition)> {
        self.state
            .lock()
            .partitions
            .iter()
            .map(|(date, p)| (*date, Arc::clone(p)))
            .collect()
    }

    /// Resident dates, ascending
    pub fn resident_dates(&self) -> Vec<NaiveDate> {
        self.state.lock().partitions.keys().copied().collect()
    }

    /// Resident partition for `date`
    pub fn get(&self, date: NaiveDate) -> Option<SharedPartition> {
        self.state.lock().partitions.get(&date).cloned()
    }

    /// Number of resident partitions
    pub fn len(&self) -> usize {
        self.state.lock().partitions.len()
    }

    /// Check if no partition is resident
    pub fn is_empty(&self) -> bool {
        self.state.lock().partitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayvec_core::Metadata;
    use dayvec_durability::StorageLayout;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn registry(dir: &TempDir, max_days: u32, today: NaiveDate) -> PartitionRegistry {
        let codec = PartitionCodec::new(StorageLayout::new(dir.path()), 2);
        PartitionRegistry::new(codec, max_days, true, today).unwrap()
    }

    fn persist(registry: &PartitionRegistry, date: NaiveDate, rows: usize) {
        let mut p = Partition::new(date, 2);
        for i in 0..rows {
            p.push(&[i as f32, 0.0], Metadata::new()).unwrap();
        }
        registry.codec().save(p.view()).unwrap();
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(day(10), 1), day(10));
        assert_eq!(window_start(day(10), 7), day(4));
        assert_eq!(window_start(NaiveDate::MIN, 3), NaiveDate::MIN);
    }

    #[test]
    fn test_zero_max_days_rejected() {
        let dir = TempDir::new().unwrap();
        let codec = PartitionCodec::new(StorageLayout::new(dir.path()), 2);
        assert!(matches!(
            PartitionRegistry::new(codec, 0, true, day(1)),
            Err(IndexError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_today_creates_once() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 3, day(5));

        let a = reg.resolve_today(day(5)).unwrap();
        let b = reg.resolve_today(day(5)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.resident_dates(), vec![day(5)]);
        // Nothing written until the first save
        assert!(!reg.codec().layout().index_path(day(5)).exists());
    }

    #[test]
    fn test_load_resident_applies_window() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 3, day(10));
        persist(&reg, day(6), 1);
        persist(&reg, day(8), 2);
        persist(&reg, day(10), 3);

        let report = reg.load_resident(day(10)).unwrap();

        assert_eq!(report.loaded, vec![day(8), day(10)]);
        assert_eq!(report.deleted, vec![day(6)]);
        assert!(!reg.codec().layout().index_path(day(6)).exists());
        assert!(!reg.codec().layout().metadata_path(day(6)).exists());
        assert_eq!(reg.get(day(10)).unwrap().read().len(), 3);
    }

    #[test]
    fn test_load_resident_skips_bad_partitions() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 7, day(10));
        persist(&reg, day(9), 1);
        persist(&reg, day(8), 1);
        fs::remove_file(reg.codec().layout().metadata_path(day(8))).unwrap();
        persist(&reg, day(7), 1);
        fs::write(reg.codec().layout().index_path(day(7)), b"garbage").unwrap();
        persist(&reg, day(12), 1);
        fs::write(dir.path().join("index_not-a-date.vec"), b"").unwrap();
        fs::write(dir.path().join("index_2024-03-09.vec.tmp"), b"").unwrap();

        let report = reg.load_resident(day(10)).unwrap();

        assert_eq!(report.loaded, vec![day(9)]);
        assert_eq!(report.skipped, vec![day(7), day(8), day(12)]);
        assert_eq!(report.unparsable, 1);
        assert!(!dir.path().join("index_2024-03-09.vec.tmp").exists());
        // Future partitions are left alone
        assert!(reg.codec().layout().index_path(day(12)).exists());
    }

    #[test]
    fn test_load_resident_keeps_expired_when_configured() {
        let dir = TempDir::new().unwrap();
        let codec = PartitionCodec::new(StorageLayout::new(dir.path()), 2);
        let reg = PartitionRegistry::new(codec, 1, false, day(10)).unwrap();
        persist(&reg, day(1), 1);

        let report = reg.load_resident(day(10)).unwrap();

        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped, vec![day(1)]);
        assert!(reg.codec().layout().index_path(day(1)).exists());
    }

    #[test]
    fn test_evict_expired_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 2, day(1));
        for d in 1..=3 {
            let p = reg.resolve_today(day(d)).unwrap();
            let mut guard = p.write();
            guard.push(&[0.0, 0.0], Metadata::new()).unwrap();
            reg.codec().save(guard.view()).unwrap();
        }

        let first = reg.evict_expired(day(3));
        let second = reg.evict_expired(day(3));

        assert_eq!(first, vec![day(1)]);
        assert!(second.is_empty());
        assert_eq!(reg.resident_dates(), vec![day(2), day(3)]);
        assert!(!reg.codec().layout().index_path(day(1)).exists());
    }

    #[test]
    fn test_evicted_partition_is_retired() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 1, day(1));
        let held = reg.resolve_today(day(1)).unwrap();

        reg.evict_expired(day(2));

        assert!(held.read().is_retired());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_rollover_check_only_fires_on_new_day() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 1, day(1));
        let before = reg.resolve_today(day(1)).unwrap();

        let same = reg.rollover_check(day(1));
        assert_eq!(same.today, day(1));
        assert!(same.evicted.is_empty());

        let next = reg.rollover_check(day(2));
        assert_eq!(next.today, day(2));
        assert_eq!(next.evicted, vec![day(1)]);

        let after = reg.resolve_today(day(2)).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(reg.last_seen(), day(2));
    }

    #[test]
    fn test_rollover_check_ignores_backwards_clock() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 3, day(5));

        let r = reg.rollover_check(day(4));

        assert_eq!(r.today, day(5));
        assert!(r.evicted.is_empty());
        assert_eq!(reg.last_seen(), day(5));
    }

    #[test]
    fn test_resolve_today_refuses_dates_behind_window() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir, 1, day(1));
        reg.rollover_check(day(2));

        assert!(matches!(
            reg.resolve_today(day(1)),
            Err(IndexError::PartitionEvicted { date }) if date == day(1)
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_stale_insert_cannot_resurrect_evicted_day() {
        let dir = TempDir::new().unwrap();
        let reg = Arc::new(registry(&dir, 1, day(1)));
        let held = reg.resolve_today(day(1)).unwrap();
        let mut guard = held.write();
        guard.push(&[1.0, 1.0], Metadata::new()).unwrap();
        reg.codec().save(guard.view()).unwrap();
        guard.mark_clean();

        // Rollover detaches day 1, then blocks on its write lock
        let roller = {
            let reg = Arc::clone(&reg);
            thread::spawn(move || reg.rollover_check(day(2)))
        };
        while reg.last_seen() != day(2) {
            thread::yield_now();
        }

        // A writer still on day 1 is refused while the eviction is pending
        assert!(matches!(
            reg.resolve_today(day(1)),
            Err(IndexError::PartitionEvicted { .. })
        ));
        drop(guard);

        let rollover = roller.join().unwrap();
        assert_eq!(rollover.evicted, vec![day(1)]);
        assert!(held.read().is_retired());
        assert!(reg.resident_dates().is_empty());
        assert!(!reg.codec().layout().index_path(day(1)).exists());
        assert!(!reg.codec().layout().metadata_path(day(1)).exists());
    }
}
