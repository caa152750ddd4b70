//! Local filesystem storage adapter (§4.6.1).
//!
//! Blobs are written to a temp file beside the target and renamed into place
//! on `close`, the same atomic-replace discipline the teacher uses for
//! config/sidecar files (`tools::file_set_contents`) generalized here to the
//! archive blob itself rather than just small metadata files.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{BarError, StorageError};
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

pub struct LocalStorage {
    root: PathBuf,
    file: Option<File>,
    temp_path: Option<PathBuf>,
    final_path: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
            temp_path: None,
            final_path: None,
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl StorageAdapter for LocalStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        let final_path = self.resolve(name);
        match mode {
            OpenMode::Read => {
                let file = File::open(&final_path)?;
                self.file = Some(file);
                self.final_path = Some(final_path);
                self.temp_path = None;
            }
            OpenMode::WriteNew => {
                if final_path.exists() {
                    return Err(StorageError::ModeConflict(name.to_string()).into());
                }
                if let Some(parent) = final_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let temp_path = final_path.with_extension("bar.tmp");
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&temp_path)?;
                self.file = Some(file);
                self.temp_path = Some(temp_path);
                self.final_path = Some(final_path);
            }
            OpenMode::WriteAppend => {
                if let Some(parent) = final_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .append(true)
                    .open(&final_path)?;
                self.file = Some(file);
                self.final_path = Some(final_path);
                self.temp_path = None;
            }
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("write on unopened storage".into()))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("read on unopened storage".into()))?;
        Ok(file.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("seek on unopened storage".into()))?;
        Ok(file.seek(pos)?)
    }

    fn size(&mut self) -> Result<u64, BarError> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| BarError::Internal("size on unopened storage".into()))?;
        Ok(file.metadata()?.len())
    }

    fn close(&mut self) -> Result<(), BarError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        if let (Some(temp_path), Some(final_path)) = (self.temp_path.take(), self.final_path.take()) {
            fs::rename(&temp_path, &final_path)?;
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), BarError> {
        let path = self.resolve(name);
        fs::remove_file(path)?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, BarError> {
        let path = self.resolve(dir);
        let mut names = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn request_volume(&mut self, _part: u32) -> Result<Option<VolumeRequest>, BarError> {
        Ok(None)
    }
}

impl Drop for LocalStorage {
    fn drop(&mut self) {
        // Best-effort cleanup of an abandoned temp file; a completed close()
        // already renamed it away, so temp_path is None there.
        if let Some(temp_path) = self.temp_path.take() {
            let _ = fs::remove_file(temp_path);
        }
    }
}

/// Used by callers that need the final path without opening the adapter,
/// e.g. the index DB recording where a storage's blob lives on disk.
pub fn final_path_for(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let mut storage = LocalStorage::new(dir.path());

        storage.open("set-1.bar", OpenMode::WriteNew).unwrap();
        storage.write(b"hello storage layer").unwrap();
        storage.close().unwrap();

        let mut storage = LocalStorage::new(dir.path());
        storage.open("set-1.bar", OpenMode::Read).unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8];
        loop {
            let n = storage.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(buf, b"hello storage layer");
    }

    #[test]
    fn write_new_rejects_existing_blob() {
        let dir = tempdir().unwrap();
        let mut storage = LocalStorage::new(dir.path());
        storage.open("set-1.bar", OpenMode::WriteNew).unwrap();
        storage.close().unwrap();

        let mut storage = LocalStorage::new(dir.path());
        let err = storage.open("set-1.bar", OpenMode::WriteNew).unwrap_err();
        assert!(matches!(err, BarError::Storage(StorageError::ModeConflict(_))));
    }

    #[test]
    fn list_returns_sorted_names() {
        let dir = tempdir().unwrap();
        for name in ["b.bar", "a.bar", "c.bar"] {
            let mut storage = LocalStorage::new(dir.path());
            storage.open(name, OpenMode::WriteNew).unwrap();
            storage.close().unwrap();
        }
        let mut storage = LocalStorage::new(dir.path());
        let names = storage.list(".").unwrap();
        assert_eq!(names, vec!["a.bar", "b.bar", "c.bar"]);
    }
}
