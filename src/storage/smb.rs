//! SMB storage adapter (§4.6.1): shells out to `smbclient` rather than
//! binding a native SMB library, mirroring the teacher's own preference for
//! driving specialized external tooling (`tape/sgutils2.rs`'s `sg_raw`
//! invocations, `sg-tape-cmd.rs`) over vendoring a protocol stack that has
//! no clear single-best crate in the ecosystem.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::process::Command;

use crate::error::BarError;
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

pub struct SmbStorage {
    host: String,
    share: String,
    user: Option<String>,
    base_path: String,
    name: Option<String>,
    mode: Option<OpenMode>,
    buffer: Cursor<Vec<u8>>,
}

impl SmbStorage {
    pub fn new(host: String, share: String, user: Option<String>, base_path: String) -> Self {
        Self {
            host,
            share,
            user,
            base_path,
            name: None,
            mode: None,
            buffer: Cursor::new(Vec::new()),
        }
    }

    fn remote_path(&self, name: &str) -> String {
        let joined = format!("{}/{}", self.base_path.trim_matches('/'), name);
        joined.replace('/', "\\")
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("smbclient");
        cmd.arg(format!("//{}/{}", self.host, self.share));
        if let Some(user) = &self.user {
            cmd.arg("-U").arg(user);
        } else {
            cmd.arg("-N");
        }
        cmd
    }

    fn run(&self, script: &str) -> Result<std::process::Output, BarError> {
        self.base_command()
            .arg("-c")
            .arg(script)
            .output()
            .map_err(|e| BarError::Network(format!("smbclient exec: {}", e)))
    }
}

impl StorageAdapter for SmbStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        self.name = Some(name.to_string());
        self.mode = Some(mode);
        self.buffer = Cursor::new(Vec::new());

        if matches!(mode, OpenMode::Read | OpenMode::WriteAppend) {
            let tmp = std::env::temp_dir().join(format!("bar-smb-{}.tmp", std::process::id()));
            let remote = self.remote_path(name);
            let script = format!("get \"{}\" \"{}\"", remote, tmp.display());
            let output = self.run(&script)?;
            if output.status.success() {
                if let Ok(data) = std::fs::read(&tmp) {
                    self.buffer = Cursor::new(data);
                }
                let _ = std::fs::remove_file(&tmp);
            } else if !matches!(mode, OpenMode::WriteAppend) {
                return Err(BarError::Storage(crate::error::StorageError::NotSupported(
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                )));
            }
            if mode == OpenMode::WriteAppend {
                self.buffer.seek(SeekFrom::End(0))?;
            } else {
                self.buffer.set_position(0);
            }
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, BarError> {
        self.buffer.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BarError> {
        Ok(self.buffer.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, BarError> {
        Ok(self.buffer.seek(pos)?)
    }

    fn size(&mut self) -> Result<u64, BarError> {
        Ok(self.buffer.get_ref().len() as u64)
    }

    fn close(&mut self) -> Result<(), BarError> {
        let name = match &self.name {
            Some(n) => n.clone(),
            None => return Ok(()),
        };
        if matches!(self.mode, Some(OpenMode::WriteNew) | Some(OpenMode::WriteAppend)) {
            let tmp = std::env::temp_dir().join(format!("bar-smb-put-{}.tmp", std::process::id()));
            std::fs::write(&tmp, self.buffer.get_ref())?;
            let remote = self.remote_path(&name);
            let script = format!("put \"{}\" \"{}\"", tmp.display(), remote);
            let output = self.run(&script)?;
            let _ = std::fs::remove_file(&tmp);
            if !output.status.success() {
                return Err(BarError::Network(String::from_utf8_lossy(&output.stderr).into_owned()));
            }
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), BarError> {
        let remote = self.remote_path(name);
        let script = format!("del \"{}\"", remote);
        let output = self.run(&script)?;
        if !output.status.success() {
            return Err(BarError::Network(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, BarError> {
        let remote = self.remote_path(dir);
        let script = format!("cd \"{}\"; ls", remote);
        let output = self.run(&script)?;
        let text = String::from_utf8_lossy(&output.stdout);
        let mut names = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(first) = trimmed.split_whitespace().next() {
                if first != "." && first != ".." && !trimmed.is_empty() {
                    names.push(first.to_string());
                }
            }
        }
        Ok(names)
    }

    fn request_volume(&mut self, _part: u32) -> Result<Option<VolumeRequest>, BarError> {
        Ok(None)
    }
}
