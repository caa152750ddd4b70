//! Incremental-list file (§4.9 "Archive type election", §6.5).
//!
//! `(path -> size, mtime, hash)` persisted as plain JSON (ambient-stack
//! choice, §1.1 of DESIGN.md), read by `INCREMENTAL`/`DIFFERENTIAL` runs to
//! decide which walked entries changed since the last `FULL`/`INCREMENTAL`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::BarError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalEntry {
    pub size: u64,
    pub mtime_unix: i64,
    /// Hex-encoded SHA-256; absent when the entry kind carries no hash
    /// (directories, links).
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncrementalList {
    pub entries: HashMap<String, IncrementalEntry>,
}

impl IncrementalList {
    pub fn load(path: &Path) -> Result<Self, BarError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path).map_err(BarError::Io)?;
        serde_json::from_slice(&data).map_err(BarError::from)
    }

    /// Atomically replaces `path`'s contents (write-to-temp, rename), the
    /// same discipline the teacher applies to its own persisted JSON
    /// records (`src/config/tape_encryption_keys.rs`).
    pub fn save(&self, path: &Path) -> Result<(), BarError> {
        let data = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &data).map_err(BarError::Io)?;
        fs::rename(&tmp, path).map_err(BarError::Io)?;
        Ok(())
    }

    /// Whether `path` changed relative to the last recorded entry, per
    /// §4.9: "only emits entries whose `(size,mtime,hash-if-cheap)` differ".
    /// A path absent from the list counts as changed (new file).
    pub fn has_changed(&self, path: &str, size: u64, mtime: SystemTime, hash: Option<&str>) -> bool {
        let mtime_unix = to_unix(mtime);
        match self.entries.get(path) {
            None => true,
            Some(prev) => prev.size != size || prev.mtime_unix != mtime_unix || prev.hash.as_deref() != hash,
        }
    }

    /// Records the current state of `path` (called after a successful
    /// `FULL`/`INCREMENTAL` run so the next incremental diff is against
    /// this run, not the previous one — `DIFFERENTIAL` never calls this,
    /// per §4.9: "reads the same file but does not update it").
    pub fn record(&mut self, path: String, size: u64, mtime: SystemTime, hash: Option<String>) {
        self.entries.insert(path, IncrementalEntry { size, mtime_unix: to_unix(mtime), hash });
    }
}

fn to_unix(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_path_counts_as_changed() {
        let list = IncrementalList::default();
        assert!(list.has_changed("/a", 10, SystemTime::UNIX_EPOCH, Some("deadbeef")));
    }

    #[test]
    fn unchanged_entry_is_not_reported() {
        let mut list = IncrementalList::default();
        list.record("/a".into(), 10, SystemTime::UNIX_EPOCH, Some("deadbeef".into()));
        assert!(!list.has_changed("/a", 10, SystemTime::UNIX_EPOCH, Some("deadbeef")));
        assert!(list.has_changed("/a", 11, SystemTime::UNIX_EPOCH, Some("deadbeef")));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incremental.json");
        let mut list = IncrementalList::default();
        list.record("/a".into(), 10, SystemTime::UNIX_EPOCH, Some("deadbeef".into()));
        list.save(&path).unwrap();

        let loaded = IncrementalList::load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert!(!loaded.has_changed("/a", 10, SystemTime::UNIX_EPOCH, Some("deadbeef")));
    }
}
