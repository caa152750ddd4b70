//! `JobOptions` and `ArchiveType` (§4.9 "Archive type election").
//!
//! The field set is wider than spec.md's distillation: it follows
//! `examples/original_source/bar/jobs.h`'s `struct JobOptions`, which is the
//! authoritative source for what a real job record carries beyond the core
//! archive-type/persistence fields spec.md kept.

use std::path::PathBuf;

use crate::archive::ArchiveFileMode;
use crate::compress::CompressAlgorithm;
use crate::error::BarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArchiveType {
    Normal,
    Full,
    Incremental,
    Differential,
    Continuous,
}

/// One job's full persisted configuration. Out-of-core concerns the spec
/// places elsewhere (PAR2 error correction, pre/post-process scripts,
/// per-protocol server settings) are kept as opaque fields the core passes
/// through rather than interprets, matching §1's "configuration object
/// delivered to the core" framing.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub includes: Vec<PathBuf>,
    pub excludes: Vec<PathBuf>,
    pub archive_type: ArchiveType,
    pub archive_part_size: u64,
    pub incremental_list_file: Option<PathBuf>,
    pub compress_algorithm: CompressAlgorithm,
    pub compress_min_file_size: u64,
    pub archive_file_mode: ArchiveFileMode,
    pub test_created_archives: bool,
    pub skip_unreadable: bool,
    pub force_delta_compression: bool,
    pub ignore_no_dump_attribute: bool,
    pub no_stop_on_error: bool,
    pub no_storage: bool,
    pub no_signature: bool,
    pub no_index_database: bool,
    pub comment: String,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            archive_type: ArchiveType::Normal,
            archive_part_size: 0,
            incremental_list_file: None,
            compress_algorithm: CompressAlgorithm::None,
            compress_min_file_size: 0,
            archive_file_mode: ArchiveFileMode::Stop,
            test_created_archives: false,
            skip_unreadable: true,
            force_delta_compression: false,
            ignore_no_dump_attribute: false,
            no_stop_on_error: true,
            no_storage: false,
            no_signature: false,
            no_index_database: false,
            comment: String::new(),
        }
    }
}

impl JobOptions {
    /// Rejects the `noStorage` + `testCreatedArchivesFlag` combination at
    /// validation time (§9 "Open questions", resolved in DESIGN.md: "if no
    /// storage is written, there is nothing to test").
    pub fn validate(&self) -> Result<(), BarError> {
        if self.no_storage && self.test_created_archives {
            return Err(BarError::Config(
                "no_storage and test_created_archives cannot both be set: nothing would be written to test".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_storage_and_test_after_create_is_rejected() {
        let mut options = JobOptions::default();
        options.no_storage = true;
        options.test_created_archives = true;
        assert!(options.validate().is_err());
    }

    #[test]
    fn default_options_validate() {
        assert!(JobOptions::default().validate().is_ok());
    }
}
