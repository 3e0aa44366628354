//! On-disk layout of the storage directory
//!
//! ```text
//! storage_dir/
//! ├── index_2024-03-08.vec        # vectors, one file per day
//! ├── metadata_2024-03-08.meta    # metadata, paired 1:1 with the index file
//! ├── index_2024-03-09.vec
//! ├── metadata_2024-03-09.meta
//! └── index_2024-03-09.vec.tmp    # in-flight or interrupted write
//! ```
//!
//! A date is loadable only when both of its files exist.

use crate::atomic::TEMP_SUFFIX;
use chrono::NaiveDate;
use dayvec_core::{IndexError, IndexResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_PREFIX: &str = "index_";
const INDEX_EXT: &str = ".vec";
const METADATA_PREFIX: &str = "metadata_";
const METADATA_EXT: &str = ".meta";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which half of a partition a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFileKind {
    /// Vector array
    Index,
    /// Metadata records
    Metadata,
}

/// Classification of a file name found in the storage directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedFileName {
    /// A partition file with a valid embedded date
    Partition(PartitionFileKind, NaiveDate),
    /// Partition-shaped name whose date does not parse
    BadDate,
    /// Not a partition file
    Foreign,
}

/// Paths of the two files backing one date
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePair {
    /// Vector file, if present
    pub index: Option<PathBuf>,
    /// Metadata file, if present
    pub metadata: Option<PathBuf>,
}

impl FilePair {
    /// Both files exist
    pub fn is_complete(&self) -> bool {
        self.index.is_some() && self.metadata.is_some()
    }

    /// All paths present in this pair
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.index.iter().chain(self.metadata.iter())
    }
}

/// Result of scanning the storage directory
#[derive(Debug, Default)]
pub struct DirectoryScan {
    /// Partition files grouped by date, ascending
    pub partitions: BTreeMap<NaiveDate, FilePair>,
    /// Partition-looking files whose embedded date could not be parsed
    pub unparsable: Vec<PathBuf>,
    /// Leftover temp files from interrupted writes
    pub temp_files: Vec<PathBuf>,
}

/// Naming scheme for partition files inside one directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    dir: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StorageLayout { dir: dir.into() }
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the vector file for `date`
    pub fn index_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            INDEX_PREFIX,
            date.format(DATE_FORMAT),
            INDEX_EXT
        ))
    }

    /// Path of the metadata file for `date`
    pub fn metadata_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            METADATA_PREFIX,
            date.format(DATE_FORMAT),
            METADATA_EXT
        ))
    }

    /// Classify a file name
    pub fn parse_file_name(name: &str) -> ParsedFileName {
        let split = if let Some(rest) = name.strip_prefix(INDEX_PREFIX) {
            rest.strip_suffix(INDEX_EXT)
                .map(|date| (PartitionFileKind::Index, date))
        } else if let Some(rest) = name.strip_prefix(METADATA_PREFIX) {
            rest.strip_suffix(METADATA_EXT)
                .map(|date| (PartitionFileKind::Metadata, date))
        } else {
            None
        };

        match split {
            Some((kind, date_str)) => match NaiveDate::parse_from_str(date_str, DATE_FORMAT) {
                Ok(date) => ParsedFileName::Partition(kind, date),
                Err(_) => ParsedFileName::BadDate,
            },
            None => ParsedFileName::Foreign,
        }
    }

    /// Enumerate partition files in the storage directory
    ///
    /// Files that are neither partition files nor temp files are ignored.
    pub fn scan(&self) -> IndexResult<DirectoryScan> {
        let mut scan = DirectoryScan::default();

        let entries = fs::read_dir(&self.dir).map_err(|e| IndexError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(TEMP_SUFFIX) {
                if name.starts_with(INDEX_PREFIX) || name.starts_with(METADATA_PREFIX) {
                    scan.temp_files.push(path);
                }
                continue;
            }

            match Self::parse_file_name(name) {
                ParsedFileName::Partition(kind, date) => {
                    let pair = scan.partitions.entry(date).or_default();
                    match kind {
                        PartitionFileKind::Index => pair.index = Some(path),
                        PartitionFileKind::Metadata => pair.metadata = Some(path),
                    }
                }
                ParsedFileName::BadDate => scan.unparsable.push(path),
                ParsedFileName::Foreign => {}
            }
        }

        scan.unparsable.sort();
        scan.temp_files.sort();
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_paths_embed_date() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.index_path(day(9)),
            PathBuf::from("/data/index_2024-03-09.vec")
        );
        assert_eq!(
            layout.metadata_path(day(9)),
            PathBuf::from("/data/metadata_2024-03-09.meta")
        );
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            StorageLayout::parse_file_name("index_2024-03-09.vec"),
            ParsedFileName::Partition(PartitionFileKind::Index, day(9))
        );
        assert_eq!(
            StorageLayout::parse_file_name("metadata_2024-03-01.meta"),
            ParsedFileName::Partition(PartitionFileKind::Metadata, day(1))
        );
        assert_eq!(
            StorageLayout::parse_file_name("index_2024-13-45.vec"),
            ParsedFileName::BadDate
        );
        assert_eq!(
            StorageLayout::parse_file_name("index_today.vec"),
            ParsedFileName::BadDate
        );
        assert_eq!(
            StorageLayout::parse_file_name("dayvec.toml"),
            ParsedFileName::Foreign
        );
        assert_eq!(
            StorageLayout::parse_file_name("index_2024-03-09.bin"),
            ParsedFileName::Foreign
        );
    }

    #[test]
    fn test_scan_groups_pairs_and_reports_strays() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());

        fs::write(layout.index_path(day(1)), b"").unwrap();
        fs::write(layout.metadata_path(day(1)), b"").unwrap();
        fs::write(layout.index_path(day(2)), b"").unwrap();
        fs::write(dir.path().join("index_garbage.vec"), b"").unwrap();
        fs::write(dir.path().join("metadata_2024-03-03.meta.tmp"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let scan = layout.scan().unwrap();

        assert_eq!(scan.partitions.len(), 2);
        assert!(scan.partitions[&day(1)].is_complete());
        assert!(!scan.partitions[&day(2)].is_complete());
        assert_eq!(scan.unparsable, vec![dir.path().join("index_garbage.vec")]);
        assert_eq!(
            scan.temp_files,
            vec![dir.path().join("metadata_2024-03-03.meta.tmp")]
        );
    }

    #[test]
    fn test_scan_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("nope"));
        assert!(matches!(
            layout.scan(),
            Err(IndexError::StorageIo { .. })
        ));
    }
}
