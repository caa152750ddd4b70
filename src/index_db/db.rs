//! `IndexDb`: the rusqlite-backed storage/entity/entry index (§4.10).

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{BarError, IndexError};
use crate::index_db::{EntityRecord, EntryRecord, StorageRecord, StorageState};

pub struct IndexDb {
    conn: Connection,
}

impl IndexDb {
    pub fn open_in_memory() -> Result<Self, BarError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open(path: &std::path::Path) -> Result<Self, BarError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), BarError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entity (
                id        INTEGER PRIMARY KEY,
                job_uuid  TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS storage (
                id        INTEGER PRIMARY KEY,
                entity_id INTEGER NOT NULL REFERENCES entity(id),
                name      TEXT NOT NULL UNIQUE,
                state     TEXT NOT NULL,
                error_message TEXT
            );
            CREATE TABLE IF NOT EXISTS entry (
                id         INTEGER PRIMARY KEY,
                storage_id INTEGER NOT NULL REFERENCES storage(id),
                path       TEXT NOT NULL,
                size       INTEGER NOT NULL,
                mtime_unix INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Inserts the entity row for `job_uuid` if it doesn't exist yet
    /// (§4.10 "Entity rule": "creating the first storage for a
    /// not-yet-existing entity inserts the entity row atomically"), and
    /// returns its id either way.
    pub fn ensure_entity(&self, job_uuid: Uuid) -> Result<i64, BarError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO entity (job_uuid) VALUES (?1)",
            params![job_uuid.to_string()],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM entity WHERE job_uuid = ?1",
            params![job_uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_entity(&self, id: i64) -> Result<EntityRecord, BarError> {
        self.conn
            .query_row("SELECT id, job_uuid FROM entity WHERE id = ?1", params![id], |row| {
                let job_uuid: String = row.get(1)?;
                Ok((row.get::<_, i64>(0)?, job_uuid))
            })
            .map_err(BarError::from)
            .and_then(|(id, job_uuid)| {
                Ok(EntityRecord {
                    id,
                    job_uuid: Uuid::parse_str(&job_uuid)
                        .map_err(|e| BarError::Index(IndexError::Schema(e.to_string())))?,
                })
            })
    }

    /// Creates a new storage row in state `CREATE` (§3 "Storage (index
    /// row): born CREATE").
    pub fn create_storage(&self, entity_id: i64, name: &str) -> Result<i64, BarError> {
        self.conn.execute(
            "INSERT INTO storage (entity_id, name, state) VALUES (?1, ?2, ?3)",
            params![entity_id, name, StorageState::Create.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_storage(&self, id: i64) -> Result<StorageRecord, BarError> {
        self.conn
            .query_row(
                "SELECT id, entity_id, name, state, error_message FROM storage WHERE id = ?1",
                params![id],
                |row| {
                    let state_str: String = row.get(3)?;
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, state_str, row.get(4)?))
                },
            )
            .map_err(BarError::from)
            .and_then(|(id, entity_id, name, state_str, error_message): (i64, i64, String, String, Option<String>)| {
                Ok(StorageRecord { id, entity_id, name, state: StorageState::from_str(&state_str)?, error_message })
            })
    }

    /// Moves a storage to `next`, validating the edge against §4.10's rule
    /// table first (I5: "a storage file in the index is always in exactly
    /// one of the states").
    pub fn transition_storage(
        &self,
        id: i64,
        next: StorageState,
        error_message: Option<&str>,
    ) -> Result<(), BarError> {
        let current = self.get_storage(id)?;
        if !current.state.can_transition_to(next) {
            return Err(BarError::Index(IndexError::BadState(format!(
                "storage {} cannot move from {:?} to {:?}",
                id, current.state, next
            ))));
        }
        self.conn.execute(
            "UPDATE storage SET state = ?1, error_message = ?2 WHERE id = ?3",
            params![next.as_str(), error_message, id],
        )?;
        Ok(())
    }

    /// Inserts every entry row for a storage inside a single transaction
    /// and moves the storage to `OK` (§4.10 "Atomicity": "Parse-result
    /// insertion uses a single transaction per storage. Partial failure
    /// discards the transaction, leaving the storage in ERROR.").
    pub fn commit_parsed_entries(&mut self, storage_id: i64, entries: &[EntryRecord]) -> Result<(), BarError> {
        let current = self.get_storage(storage_id)?;
        if !current.state.can_transition_to(StorageState::Ok) {
            return Err(BarError::Index(IndexError::BadState(format!(
                "storage {} is not in UPDATE, cannot commit parsed entries",
                storage_id
            ))));
        }

        let tx = self.conn.transaction()?;
        let result: Result<(), BarError> = (|| {
            for entry in entries {
                tx.execute(
                    "INSERT INTO entry (storage_id, path, size, mtime_unix) VALUES (?1, ?2, ?3, ?4)",
                    params![entry.storage_id, entry.path, entry.size as i64, entry.mtime_unix],
                )?;
            }
            tx.execute(
                "UPDATE storage SET state = ?1, error_message = NULL WHERE id = ?2",
                params![StorageState::Ok.as_str(), storage_id],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(err) => {
                // drop rolls the transaction back before we touch self.conn again
                drop(tx);
                self.conn.execute(
                    "UPDATE storage SET state = ?1, error_message = ?2 WHERE id = ?3",
                    params![StorageState::Error.as_str(), err.to_string(), storage_id],
                )?;
                Err(err)
            }
        }
    }

    /// Crash-recovery reconciliation (§8 property 6): every row stuck in
    /// `UPDATE` with no live updater moves back to `UPDATE_REQUESTED` for
    /// retry. Called once at daemon startup.
    pub fn reconcile_after_crash(&self) -> Result<usize, BarError> {
        let n = self.conn.execute(
            "UPDATE storage SET state = ?1 WHERE state = ?2",
            params![StorageState::UpdateRequested.as_str(), StorageState::Update.as_str()],
        )?;
        Ok(n)
    }

    /// Purge worker: removes child entry rows first, then the storage row,
    /// for every storage already in `DELETED` (§4.10 "any -> DELETED ...
    /// purge worker removes child entry rows first, then the storage row").
    pub fn purge_deleted(&self) -> Result<usize, BarError> {
        let ids: Vec<i64> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM storage WHERE state = ?1")?;
            let rows = stmt.query_map(params![StorageState::Deleted.as_str()], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()?
        };
        for id in &ids {
            self.conn.execute("DELETE FROM entry WHERE storage_id = ?1", params![id])?;
            self.conn.execute("DELETE FROM storage WHERE id = ?1", params![id])?;
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_storage_for_a_job_creates_the_entity_row() {
        let db = IndexDb::open_in_memory().unwrap();
        let job_uuid = Uuid::new_v4();
        let id1 = db.ensure_entity(job_uuid).unwrap();
        let id2 = db.ensure_entity(job_uuid).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn full_lifecycle_reaches_ok() {
        let mut db = IndexDb::open_in_memory().unwrap();
        let entity_id = db.ensure_entity(Uuid::new_v4()).unwrap();
        let storage_id = db.create_storage(entity_id, "set-1.000").unwrap();

        db.transition_storage(storage_id, StorageState::UpdateRequested, None).unwrap();
        db.transition_storage(storage_id, StorageState::Update, None).unwrap();
        db.commit_parsed_entries(
            storage_id,
            &[EntryRecord { storage_id, path: "/a".into(), size: 10, mtime_unix: 0 }],
        )
        .unwrap();

        assert_eq!(db.get_storage(storage_id).unwrap().state, StorageState::Ok);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let db = IndexDb::open_in_memory().unwrap();
        let entity_id = db.ensure_entity(Uuid::new_v4()).unwrap();
        let storage_id = db.create_storage(entity_id, "set-2.000").unwrap();
        let err = db.transition_storage(storage_id, StorageState::Ok, None).unwrap_err();
        assert!(matches!(err, BarError::Index(IndexError::BadState(_))));
    }

    #[test]
    fn crash_recovery_resets_update_rows() {
        let db = IndexDb::open_in_memory().unwrap();
        let entity_id = db.ensure_entity(Uuid::new_v4()).unwrap();
        let storage_id = db.create_storage(entity_id, "set-3.000").unwrap();
        db.transition_storage(storage_id, StorageState::UpdateRequested, None).unwrap();
        db.transition_storage(storage_id, StorageState::Update, None).unwrap();

        let n = db.reconcile_after_crash().unwrap();
        assert_eq!(n, 1);
        assert_eq!(db.get_storage(storage_id).unwrap().state, StorageState::UpdateRequested);
    }

    #[test]
    fn purge_removes_entries_then_storage() {
        let mut db = IndexDb::open_in_memory().unwrap();
        let entity_id = db.ensure_entity(Uuid::new_v4()).unwrap();
        let storage_id = db.create_storage(entity_id, "set-4.000").unwrap();
        db.transition_storage(storage_id, StorageState::UpdateRequested, None).unwrap();
        db.transition_storage(storage_id, StorageState::Update, None).unwrap();
        db.commit_parsed_entries(
            storage_id,
            &[EntryRecord { storage_id, path: "/a".into(), size: 1, mtime_unix: 0 }],
        )
        .unwrap();
        db.transition_storage(storage_id, StorageState::Deleted, None).unwrap();

        let purged = db.purge_deleted().unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_storage(storage_id).is_err());
    }
}
