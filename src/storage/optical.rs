//! Optical/device storage adapter (§4.6.1, §4.6 "Volume requests").
//!
//! Writes accumulate in a spool file on the configured staging area; once a
//! part is closed, `request_volume` reports `VOLUME_REQUEST_{INITIAL,
//! REPLACEMENT}` so the caller can run the configured `load`/`unload`/
//! `blank`/`write` command templates (or block for an operator), exactly
//! the flow the teacher's `tape::drive::request_and_load_media` drives for
//! LTO tape, generalized here to any jukebox/optical media family.

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Command;

use crate::error::BarError;
use crate::storage::url::OpticalKind;
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

/// External command templates for a given optical family; `{device}` and
/// `{path}` placeholders are substituted before the shell runs them.
#[derive(Debug, Clone, Default)]
pub struct OpticalCommands {
    pub load: Option<String>,
    pub unload: Option<String>,
    pub blank: Option<String>,
    pub write: Option<String>,
}

pub struct OpticalStorage {
    kind: OpticalKind,
    device: Option<String>,
    path: String,
    commands: OpticalCommands,
    spool: Option<std::fs::File>,
    spool_path: Option<std::path::PathBuf>,
    part: u32,
}

impl OpticalStorage {
    pub fn new(kind: OpticalKind, device: Option<String>, path: String) -> Self {
        Self {
            kind,
            device,
            path,
            commands: OpticalCommands::default(),
            spool: None,
            spool_path: None,
            part: 0,
        }
    }

    pub fn with_commands(mut self, commands: OpticalCommands) -> Self {
        self.commands = commands;
        self
    }

    fn device_node(&self) -> &str {
        self.device.as_deref().unwrap_or(match self.kind {
            OpticalKind::Cd | OpticalKind::Dvd | OpticalKind::Bd => "/dev/sr0",
            OpticalKind::Device => "/dev/sr0",
        })
    }

    fn run_template(&self, template: &str) -> Result<(), BarError> {
        let expanded = template
            .replace("{device}", self.device_node())
            .replace("{path}", &self.path);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&expanded)
            .status()
            .map_err(|e| BarError::Io(e))?;
        if !status.success() {
            return Err(BarError::Storage(crate::error::StorageError::NotSupported(format!(
                "command failed: {}",
                expanded
            ))));
        }
        Ok(())
    }
}

impl StorageAdapter for OpticalStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        let spool_path = std::env::temp_dir().join(format!("bar-optical-{}-{}", std::process::id(), name));
        let file = match mode {
            OpenMode::Read => std::fs::File::open(&spool_path)?,
            OpenMode::WriteNew | OpenMode::WriteAppend => std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(matches!(mode, OpenMode::WriteNew))
                .open(&spool_path)?,
        };
        self.spool = Some(file);
        self.spool_path = Some(spool_path);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, BarError> {
        let file = self
            .spool
            .as_mut()
            .ok_or_else(|| BarError::Internal("write on unopened optical storage".into()))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BarError> {
        let file = self
            .spool
            .as_mut()
            .ok_or_else(|| BarError::Internal("read on unopened optical storage".into()))?;
        Ok(file.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, BarError> {
        let file = self
            .spool
            .as_mut()
            .ok_or_else(|| BarError::Internal("seek on unopened optical storage".into()))?;
        Ok(file.seek(pos)?)
    }

    fn size(&mut self) -> Result<u64, BarError> {
        let file = self
            .spool
            .as_ref()
            .ok_or_else(|| BarError::Internal("size on unopened optical storage".into()))?;
        Ok(file.metadata()?.len())
    }

    fn close(&mut self) -> Result<(), BarError> {
        if let Some(mut file) = self.spool.take() {
            file.flush()?;
        }
        if let Some(write_template) = self.commands.write.clone() {
            self.run_template(&write_template)?;
        }
        self.part += 1;
        Ok(())
    }

    fn delete(&mut self, _name: &str) -> Result<(), BarError> {
        Err(BarError::NotSupported("optical media does not support in-place delete".into()))
    }

    fn list(&mut self, _dir: &str) -> Result<Vec<String>, BarError> {
        Err(BarError::NotSupported("optical media does not support listing without a catalog".into()))
    }

    fn request_volume(&mut self, part: u32) -> Result<Option<VolumeRequest>, BarError> {
        if part == 0 {
            Ok(Some(VolumeRequest::Initial { part }))
        } else {
            Ok(Some(VolumeRequest::Replacement { part }))
        }
    }
}

impl Drop for OpticalStorage {
    fn drop(&mut self) {
        if let Some(path) = self.spool_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
