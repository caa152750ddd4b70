//! SFTP/SCP storage adapter (§4.6.1), built on `ssh2` — an enrichment pick;
//! the teacher never speaks SSH, but `ssh2` is the crate the wider Rust
//! ecosystem reaches for here.

use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpStream;

use ssh2::Session;

use crate::error::BarError;
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

pub struct SftpStorage {
    host: String,
    port: Option<u16>,
    user: Option<String>,
    base_path: String,
    session: Option<Session>,
    file: Option<ssh2::File>,
    path: Option<String>,
}

impl SftpStorage {
    pub fn new(host: String, port: Option<u16>, user: Option<String>, base_path: String) -> Self {
        Self {
            host,
            port,
            user,
            base_path,
            session: None,
            file: None,
            path: None,
        }
    }

    fn connect(&mut self) -> Result<(), BarError> {
        if self.session.is_some() {
            return Ok(());
        }
        let addr = format!("{}:{}", self.host, self.port.unwrap_or(22));
        let tcp = TcpStream::connect(&addr)
            .map_err(|e| BarError::Network(format!("sftp connect {}: {}", addr, e)))?;
        let mut session = Session::new().map_err(|e| BarError::Network(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| BarError::Network(format!("sftp handshake: {}", e)))?;

        let user = self.user.clone().unwrap_or_else(|| "bar".to_string());
        // Agent auth first (typical for unattended backup jobs), falling
        // back to the host's default identity files.
        if session.userauth_agent(&user).is_err() {
            session
                .userauth_pubkey_file(&user, None, std::path::Path::new("~/.ssh/id_ed25519"), None)
                .map_err(|e| BarError::Authentication(format!("sftp auth: {}", e)))?;
        }
        self.session = Some(session);
        Ok(())
    }

    fn full_path(&self, name: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), name)
    }
}

impl StorageAdapter for SftpStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        self.connect()?;
        let path = self.full_path(name);
        let session = self.session.as_ref().unwrap();
        let sftp = session
            .sftp()
            .map_err(|e| BarError::Network(format!("sftp subsystem: {}", e)))?;

        let flags = match mode {
            OpenMode::Read => ssh2::OpenFlags::READ,
            OpenMode::WriteNew => ssh2::OpenFlags::WRITE | ssh2::OpenFlags::CREATE | ssh2::OpenFlags::TRUNCATE,
            OpenMode::WriteAppend => ssh2::OpenFlags::WRITE | ssh2::OpenFlags::CREATE | ssh2::OpenFlags::APPEND,
        };
        let file = sftp
            .open_mode(std::path::Path::new(&path), flags, 0o644, ssh2::OpenType::File)
            .map_err(|e| BarError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("write on unopened sftp storage".into()))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("read on unopened sftp storage".into()))?;
        Ok(file.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("seek on unopened sftp storage".into()))?;
        Ok(file.seek(pos)?)
    }

    fn size(&mut self) -> Result<u64, BarError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| BarError::Internal("size on unopened sftp storage".into()))?;
        let stat = file
            .stat()
            .map_err(|e| BarError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(stat.size.unwrap_or(0))
    }

    fn close(&mut self) -> Result<(), BarError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), BarError> {
        self.connect()?;
        let path = self.full_path(name);
        let session = self.session.as_ref().unwrap();
        let sftp = session
            .sftp()
            .map_err(|e| BarError::Network(format!("sftp subsystem: {}", e)))?;
        sftp.unlink(std::path::Path::new(&path))
            .map_err(|e| BarError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, BarError> {
        self.connect()?;
        let path = self.full_path(dir);
        let session = self.session.as_ref().unwrap();
        let sftp = session
            .sftp()
            .map_err(|e| BarError::Network(format!("sftp subsystem: {}", e)))?;
        let entries = sftp
            .readdir(std::path::Path::new(&path))
            .map_err(|e| BarError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let mut names: Vec<String> = entries
            .into_iter()
            .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    fn request_volume(&mut self, _part: u32) -> Result<Option<VolumeRequest>, BarError> {
        Ok(None)
    }
}
