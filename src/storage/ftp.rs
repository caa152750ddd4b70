//! FTP storage adapter (§4.6.1), built on `suppaftp` — an enrichment pick
//! from the wider ecosystem, since the teacher's own stack only ever talks
//! its own HTTP/TLS client protocol, never plain FTP.
//!
//! Transfers are buffered in memory and flushed whole on `close`/`open`;
//! `suppaftp`'s streaming `retr`/`put_file` callbacks could replace this for
//! very large blobs, but whole-buffer transfer keeps the adapter's state
//! machine identical to `LocalStorage`'s.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use suppaftp::FtpStream;

use crate::error::{BarError, StorageError};
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

pub struct FtpStorage {
    host: String,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    base_path: String,
    name: Option<String>,
    mode: Option<OpenMode>,
    buffer: Cursor<Vec<u8>>,
}

impl FtpStorage {
    pub fn new(
        host: String,
        port: Option<u16>,
        user: Option<String>,
        password: Option<String>,
        base_path: String,
    ) -> Self {
        Self {
            host,
            port,
            user,
            password,
            base_path,
            name: None,
            mode: None,
            buffer: Cursor::new(Vec::new()),
        }
    }

    fn connect(&self) -> Result<FtpStream, BarError> {
        let addr = format!("{}:{}", self.host, self.port.unwrap_or(21));
        let mut stream = FtpStream::connect(&addr)
            .map_err(|e| BarError::Network(format!("ftp connect {}: {}", addr, e)))?;
        let user = self.user.as_deref().unwrap_or("anonymous");
        let pass = self.password.as_deref().unwrap_or("");
        stream
            .login(user, pass)
            .map_err(|e| BarError::Authentication(format!("ftp login: {}", e)))?;
        Ok(stream)
    }

    fn full_path(&self, name: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), name)
    }
}

impl StorageAdapter for FtpStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        self.name = Some(name.to_string());
        self.mode = Some(mode);
        self.buffer = Cursor::new(Vec::new());

        if matches!(mode, OpenMode::Read | OpenMode::WriteAppend) {
            let mut stream = self.connect()?;
            let path = self.full_path(name);
            match stream.retr_as_buffer(&path) {
                Ok(cursor) => self.buffer = cursor,
                Err(_) if mode == OpenMode::WriteAppend => {
                    // No existing blob yet; start from empty.
                }
                Err(e) => return Err(BarError::Network(format!("ftp retr {}: {}", path, e))),
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
            let mut stream = self.connect()?;
            let path = self.full_path(&name);
            let data = self.buffer.get_ref().clone();
            let mut reader = Cursor::new(data);
            stream
                .put_file(&path, &mut reader)
                .map_err(|e| BarError::Network(format!("ftp stor {}: {}", path, e)))?;
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), BarError> {
        let mut stream = self.connect()?;
        let path = self.full_path(name);
        stream
            .rm(&path)
            .map_err(|e| BarError::Network(format!("ftp dele {}: {}", path, e)))?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, BarError> {
        let mut stream = self.connect()?;
        let path = self.full_path(dir);
        let names = stream
            .nlst(Some(&path))
            .map_err(|e| BarError::Network(format!("ftp nlst {}: {}", path, e)))?;
        Ok(names)
    }

    fn request_volume(&mut self, _part: u32) -> Result<Option<VolumeRequest>, BarError> {
        Ok(None)
    }
}

impl From<suppaftp::FtpError> for StorageError {
    fn from(e: suppaftp::FtpError) -> Self {
        StorageError::NotSupported(e.to_string())
    }
}
