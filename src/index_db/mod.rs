//! Index DB (C10, spec §4.10).
//!
//! Maps storages and entries to searchable metadata via the storage-state
//! machine of §4.10 (`CREATE -> UPDATE_REQUESTED -> UPDATE -> {OK, ERROR,
//! UPDATE_REQUESTED} -> DELETED`), the entity-row-on-first-storage rule, and
//! per-storage transactional entry insertion. `rusqlite` is the natural
//! single-file default for "SQLite/MariaDB/PostgreSQL table set" (§6.5);
//! the trait/impl seam (`IndexDb`) is where a `sqlx`-backed alternative
//! would slot in without touching callers.

mod db;
mod state;

pub use db::IndexDb;
pub use state::StorageState;

use uuid::Uuid;

/// One storage row as tracked by the index (§4.10, §3 "Storage (index row)").
#[derive(Debug, Clone)]
pub struct StorageRecord {
    pub id: i64,
    pub entity_id: i64,
    pub name: String,
    pub state: StorageState,
    pub error_message: Option<String>,
}

/// One entity row: a single run of a single job (§3 "Entity").
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: i64,
    pub job_uuid: Uuid,
}

/// One entry row: one archive entry's searchable metadata (§3 "Entry").
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub storage_id: i64,
    pub path: String,
    pub size: u64,
    pub mtime_unix: i64,
}
