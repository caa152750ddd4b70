//! Job & scheduler core (C9, spec §4.9).
//!
//! A *job* is a named, persisted configuration plus a run-time `JobState`.
//! This module owns the state machine, archive-type election (including the
//! incremental-list diff), the generic `{min_keep,max_keep,max_age}`
//! persistence policy (§8 property 7) and the minute-tick scheduler.
//! Grounded on `src/backup/prune.rs`'s keep-N-per-bucket retention algorithm,
//! generalized from fixed last/daily/weekly/monthly/yearly buckets to the
//! spec's generic rule list, and on `examples/original_source/bar/jobs.h`'s
//! `struct JobOptions` for the full field set a job record carries.

mod incremental;
mod options;
mod persistence;
mod schedule;
mod state;

pub use incremental::{IncrementalEntry, IncrementalList};
pub use options::{ArchiveType, JobOptions};
pub use persistence::{retained_storages, PersistenceRule, StorageSample};
pub use schedule::{DatePattern, Schedule, TimePattern, Weekday};
pub use state::{JobState, Trigger};

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::BarError;

/// One named job record: its persisted options plus live run-time state.
/// The `(min_keep, max_keep, max_age_days)` rules and schedules referenced
/// here are the job's own — §4.9's job/schedule split keeps both inside one
/// record rather than a separate join table, matching the teacher's
/// per-job file layout (§6.5).
pub struct Job {
    pub uuid: Uuid,
    pub name: String,
    pub options: JobOptions,
    pub schedules: Vec<Schedule>,
    pub persistence_rules: Vec<PersistenceRule>,
    pub state: JobState,
    pub last_executed: HashMap<ArchiveType, i64>,
}

impl Job {
    pub fn new(name: String, options: JobOptions) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            options,
            schedules: Vec::new(),
            persistence_rules: Vec::new(),
            state: JobState::None,
            last_executed: HashMap::new(),
        }
    }

    /// Applies a trigger, mutating `state` per the transition table (§4.9
    /// "States"). Idempotent: dropped (returns `Ok(false)`) if the job is
    /// already `Waiting` or `Running` (§4.9 "Scheduling": "Triggers are
    /// idempotent").
    pub fn trigger(&mut self, trigger: Trigger) -> Result<bool, BarError> {
        if matches!(trigger, Trigger::Start { .. }) && matches!(self.state, JobState::Waiting | JobState::Running) {
            return Ok(false);
        }
        self.state = state::apply(self.state, trigger)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent_while_waiting() {
        let mut job = Job::new("nightly".into(), JobOptions::default());
        assert!(job.trigger(Trigger::Start { archive_type: ArchiveType::Full }).unwrap());
        assert_eq!(job.state, JobState::Waiting);
        assert!(!job.trigger(Trigger::Start { archive_type: ArchiveType::Full }).unwrap());
    }
}
