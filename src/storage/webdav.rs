//! WebDAV storage adapter (§4.6.1), built on blocking `reqwest` — already in
//! the teacher's dependency tree, used there for its own HTTP/TLS client;
//! here it's pointed at generic WebDAV PUT/GET/DELETE/PROPFIND instead.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::error::BarError;
use crate::storage::{OpenMode, StorageAdapter, VolumeRequest};

pub struct WebDavStorage {
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    secure: bool,
    client: Client,
    name: Option<String>,
    mode: Option<OpenMode>,
    buffer: Cursor<Vec<u8>>,
}

impl WebDavStorage {
    pub fn new(base_url: String, user: Option<String>, password: Option<String>, secure: bool) -> Self {
        Self {
            base_url,
            user,
            password,
            secure,
            client: Client::new(),
            name: None,
            mode: None,
            buffer: Cursor::new(Vec::new()),
        }
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(user) = &self.user {
            req = req.basic_auth(user, self.password.clone());
        }
        req
    }
}

impl StorageAdapter for WebDavStorage {
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), BarError> {
        self.name = Some(name.to_string());
        self.mode = Some(mode);
        self.buffer = Cursor::new(Vec::new());

        if matches!(mode, OpenMode::Read | OpenMode::WriteAppend) {
            let url = self.url_for(name);
            let resp = self
                .request(reqwest::Method::GET, &url)
                .send()
                .map_err(|e| BarError::Network(format!("webdav get {}: {}", url, e)))?;
            if resp.status() == StatusCode::NOT_FOUND && mode == OpenMode::WriteAppend {
                // No existing blob; start from empty.
            } else {
                let resp = resp
                    .error_for_status()
                    .map_err(|e| BarError::Network(format!("webdav get {}: {}", url, e)))?;
                let bytes = resp
                    .bytes()
                    .map_err(|e| BarError::Network(format!("webdav body {}: {}", url, e)))?;
                self.buffer = Cursor::new(bytes.to_vec());
            }
            if mode == OpenMode::WriteAppend {
                self.buffer.seek(SeekFrom::End(0))?;
            } else {
                self.buffer.set_position(0);
            }
        }
        if !self.secure && self.base_url.starts_with("https") {
            return Err(BarError::Config("webdav scheme/security mismatch".into()));
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
            let url = self.url_for(&name);
            self.request(reqwest::Method::PUT, &url)
                .body(self.buffer.get_ref().clone())
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| BarError::Network(format!("webdav put {}: {}", url, e)))?;
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), BarError> {
        let url = self.url_for(name);
        self.request(reqwest::Method::DELETE, &url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| BarError::Network(format!("webdav delete {}: {}", url, e)))?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, BarError> {
        // A minimal PROPFIND depth-1 listing, parsed for `<D:href>` entries;
        // servers that need the full XML property model aren't in scope.
        let url = self.url_for(dir);
        let resp = self
            .request(reqwest::Method::from_bytes(b"PROPFIND").unwrap(), &url)
            .header("Depth", "1")
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| BarError::Network(format!("webdav propfind {}: {}", url, e)))?;
        let body = resp
            .text()
            .map_err(|e| BarError::Network(format!("webdav propfind body: {}", e)))?;
        let mut names = Vec::new();
        for line in body.split("<D:href>").skip(1) {
            if let Some(end) = line.find("</D:href>") {
                if let Some(last_segment) = line[..end].rsplit('/').find(|s| !s.is_empty()) {
                    names.push(last_segment.to_string());
                }
            }
        }
        Ok(names)
    }

    fn request_volume(&mut self, _part: u32) -> Result<Option<VolumeRequest>, BarError> {
        Ok(None)
    }
}
