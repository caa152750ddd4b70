//! Persistence (retention) policy (§4.9 "Persistence policy", §8 property 7).
//!
//! Generalizes `src/backup/prune.rs`'s `mark_selections` (keep-N-per-bucket
//! over fixed last/daily/weekly/monthly/yearly buckets) to the spec's
//! generic `{min_keep, max_keep, max_age_days}` rule list: deletion is the
//! union of what every rule would retain (§4.9), so retention, not removal,
//! is the thing each rule computes.

use crate::job::ArchiveType;

/// `AGE_FOREVER` sentinel (§4.9): the rule never age-expires anything.
pub const AGE_FOREVER: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub struct PersistenceRule {
    pub archive_type: ArchiveType,
    pub min_keep: usize,
    pub max_keep: usize,
    pub max_age_days: i64,
}

/// A storage row as seen by the persistence engine: just old enough to
/// decide keep/delete, nothing the caller needs to re-derive.
#[derive(Debug, Clone, Copy)]
pub struct StorageSample {
    pub id: u64,
    pub archive_type: ArchiveType,
    pub age_days: i64,
}

/// Returns the ids of storages to retain (§8 property 7: "the retained set
/// equals the union over R of the youngest max_keep storages within
/// max_age_days, and at least min_keep of each type unconditionally").
///
/// `storages` need not be sorted; each rule independently selects its
/// youngest `max_keep` within `max_age_days`, then backfills up to
/// `min_keep` with the next-youngest regardless of age, and the final
/// retained set is the union across all rules that apply to a given
/// storage's archive type.
pub fn retained_storages(storages: &[StorageSample], rules: &[PersistenceRule]) -> Vec<u64> {
    let mut retained = std::collections::HashSet::new();

    for rule in rules {
        let mut matching: Vec<&StorageSample> =
            storages.iter().filter(|s| s.archive_type == rule.archive_type).collect();
        matching.sort_by_key(|s| s.age_days);

        let within_age: Vec<&&StorageSample> = matching
            .iter()
            .filter(|s| rule.max_age_days == AGE_FOREVER || s.age_days <= rule.max_age_days)
            .collect();
        for sample in within_age.iter().take(rule.max_keep) {
            retained.insert(sample.id);
        }

        for sample in matching.iter().take(rule.min_keep) {
            retained.insert(sample.id);
        }
    }

    retained.into_iter().collect()
}
