//! Archive reader (C5, spec §4.5).
//!
//! `ArchiveReader` iterates the entries of one storage part: it parses each
//! top-level chunk, reassembles its fragment payloads through decrypt →
//! decompress (verifying the entry's hash as it goes, §4.5 "Hash
//! verification"), and then applies include/exclude selection to the
//! resulting path before handing the entry back to the caller.
//!
//! Grounded on the teacher's `ReadChunk`/`AsyncReadChunk` split
//! (`src/backup/read_chunk.rs`) for the sync-core shape, and
//! `ChecksumReader` (`src/backup/checksum_reader.rs`) for the
//! hasher-wrapped streaming pattern, swapped from CRC32+HMAC to SHA-256
//! (§4.5.1).

use openssl::sha::Sha256;
use regex::Regex;

use crate::archive::{CoverStatus, EntryKind, SpecialKind, StorageIo};
use crate::chunk::{ChunkHeader, ChunkId, ChunkReader, FieldSpec};
use crate::compress::{self, CompressAlgorithm};
use crate::crypto::signature::VerifyingKey;
use crate::crypto::{self, CryptConfig};
use crate::error::{BarError, ChunkError};
use crate::storage::{OpenMode, StorageAdapter};

/// Which dialect a selection pattern is written in (§4.5 "Selection").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Glob,
    Regex,
    ExtendedRegex,
}

/// Include/exclude path selection for a read pass (§4.5 "Selection").
/// Includes match as a prefix, excludes match exactly — matching the
/// spec's asymmetric rule verbatim.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub includes: Vec<(String, PatternKind)>,
    pub excludes: Vec<(String, PatternKind)>,
}

impl ReadOptions {
    fn compile(pattern: &str, kind: PatternKind) -> Result<Regex, BarError> {
        let expr = match kind {
            PatternKind::Glob => glob_to_regex(pattern),
            PatternKind::Regex | PatternKind::ExtendedRegex => pattern.to_string(),
        };
        Regex::new(&expr).map_err(|e| BarError::InvalidArgument(format!("bad pattern '{}': {}", pattern, e)))
    }

    /// True if `path` should be emitted: matches some include as a prefix,
    /// and no exclude exactly (§4.5 "Selection").
    pub fn accepts(&self, path: &str) -> Result<bool, BarError> {
        if !self.includes.is_empty() {
            let mut matched = false;
            for (pattern, kind) in &self.includes {
                let re = Self::compile(pattern, *kind)?;
                if re.find(path).map(|m| m.start() == 0).unwrap_or(false) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(false);
            }
        }
        for (pattern, kind) in &self.excludes {
            let re = Self::compile(pattern, *kind)?;
            if let Some(m) = re.find(path) {
                if m.start() == 0 && m.end() == path.len() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

/// Translates the default `GLOB` dialect (`*`, `?`, `[...]`) into a `regex`
/// expression, since the teacher's own pattern-matching crate is a local
/// path dependency outside the retrieval pack (§4.5.1).
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                while let Some(&next) = chars.peek() {
                    out.push(next);
                    chars.next();
                    if next == ']' {
                        break;
                    }
                }
            }
            c if "\\.+^$(){}|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// One emitted entry: metadata plus (if not skipped) its reassembled,
/// hash-verified payload.
pub struct ReadEntry {
    pub kind: EntryKind,
    pub cover: CoverStatus,
    pub payload: Option<Vec<u8>>,
}

/// Reads entries from a single storage part (§4.5 "Contract"). Multi-part
/// archives are read by constructing one reader per part in sequence; the
/// core does not hide that seam since part boundaries are meaningful to
/// callers driving volume swaps (§4.6 "Volume requests"). `base_offset` is
/// the cumulative byte size of every prior part — the writer numbers
/// fragment chunk offsets (and hence derives per-chunk IVs, §4.2.1) against
/// the whole multi-part archive, not each part in isolation, so a caller
/// reading part N > 0 must pass the sum of parts `0..N`'s on-disk sizes.
pub struct ArchiveReader<S: StorageAdapter> {
    inner: ChunkReader<StorageIo<S>>,
    crypt: Option<CryptConfig>,
    crc_checked: bool,
    base_offset: u64,
}

impl<S: StorageAdapter> ArchiveReader<S> {
    /// `open(storage) -> Reader` (§4.5 "Contract"), for the first part.
    pub fn open(storage: S, name: &str, crypt: Option<CryptConfig>) -> Result<Self, BarError> {
        Self::open_part(storage, name, crypt, 0)
    }

    /// `open` for a part other than the first, given the cumulative size of
    /// every part before it.
    pub fn open_part(mut storage: S, name: &str, crypt: Option<CryptConfig>, base_offset: u64) -> Result<Self, BarError> {
        storage.open(name, OpenMode::Read)?;
        let mut reader = Self {
            inner: ChunkReader::new(StorageIo::new(storage)),
            crypt,
            crc_checked: false,
            base_offset,
        };
        reader.read_header()?;
        Ok(reader)
    }

    fn read_header(&mut self) -> Result<(), BarError> {
        let hdr = self
            .inner
            .next_chunk()?
            .ok_or_else(|| BarError::Entry("empty archive: no BAR0 header".into()))?;
        if hdr.id != crate::chunk::ids::BAR0 {
            return Err(BarError::Entry(format!(
                "expected BAR0 header, found {}",
                crate::chunk::ids::id_to_string(&hdr.id)
            )));
        }
        self.inner.read_fixed(&[FieldSpec::U32, FieldSpec::U32])?;
        self.inner.read_payload_to_end()?;
        Ok(())
    }

    /// The absolute offset (within the whole multi-part archive) of the
    /// next byte about to be read — ground truth via the storage's own
    /// stream position rather than a hand-tallied running counter, so it
    /// can never drift from what the writer actually wrote (mirrors
    /// `ArchiveWriter::resync_counters`).
    fn absolute_offset(&mut self) -> Result<u64, BarError> {
        let local = self.inner.get_mut().storage.seek(std::io::SeekFrom::Current(0))?;
        Ok(self.base_offset + local)
    }

    /// Whether a `CryptConfig` is configured for this part (used by tests
    /// and by callers deciding whether to request a passphrase up front).
    pub fn is_encrypted(&self) -> bool {
        self.crypt.is_some()
    }

    /// Reads the next top-level entry, applying `options` once the entry's
    /// path is known (§4.5 "Selection"). Returns `Ok(None)` once
    /// `IDX0`/`SIG0`/end of stream is reached.
    pub fn next_entry(&mut self, options: &ReadOptions) -> Result<Option<ReadEntry>, BarError> {
        loop {
            let hdr = match self.inner.next_chunk() {
                Ok(Some(hdr)) => hdr,
                Ok(None) => return Ok(None),
                Err(err) => {
                    // A top-level parse failure resyncs forward (§4.1 "Key
                    // algorithm"); the caller sees this entry as lost but
                    // iteration continues.
                    self.inner.resync_top_level()?;
                    return Err(err);
                }
            };

            if hdr.id == crate::chunk::ids::IDX0 || hdr.id == crate::chunk::ids::SIG0 {
                self.inner.skip_remainder()?;
                continue;
            }

            if !is_known_entry_chunk(hdr.id) {
                self.inner.skip_remainder()?;
                continue;
            }

            let entry = self.read_entry_body(hdr)?;
            if let Some(path) = entry.kind.path() {
                if !options.accepts(path)? {
                    continue;
                }
            }
            return Ok(Some(entry));
        }
    }

    fn read_entry_body(&mut self, hdr: ChunkHeader) -> Result<ReadEntry, BarError> {
        match hdr.id {
            id if id == crate::chunk::ids::FILE => self.read_file_entry(),
            id if id == crate::chunk::ids::IMGE => self.read_image_entry(),
            id if id == crate::chunk::ids::DIRE => self.read_directory_entry(),
            id if id == crate::chunk::ids::LINK => self.read_link_entry(),
            id if id == crate::chunk::ids::HLNK => self.read_hardlink_entry(),
            id if id == crate::chunk::ids::SPEC => self.read_special_entry(),
            id if id == crate::chunk::ids::META => self.read_meta_entry(),
            other => Err(BarError::Entry(format!("unexpected entry chunk {}", crate::chunk::ids::id_to_string(&other)))),
        }
    }

    fn read_file_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self.inner.read_fixed(&[FieldSpec::Str16, FieldSpec::U64, FieldSpec::Raw(32)])?;
        let path = fields[0].as_str().unwrap_or_default().to_string();
        let size = fields[1].as_u64().unwrap_or(0);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(fields[2].as_raw().unwrap_or(&[0u8; 32]));

        let (payload, cover) = self.collect_fragments(size)?;
        self.verify_hash(&hash, &payload)?;
        self.inner.end_chunk()?;

        Ok(ReadEntry {
            kind: EntryKind::File { meta: placeholder_meta(path), size, hash },
            cover,
            payload: Some(payload),
        })
    }

    fn read_image_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self
            .inner
            .read_fixed(&[FieldSpec::Str16, FieldSpec::U32, FieldSpec::U64, FieldSpec::Raw(32)])?;
        let device_path = fields[0].as_str().unwrap_or_default().to_string();
        let block_size = fields[1].as_u64().unwrap_or(0) as u32;
        let total_size = fields[2].as_u64().unwrap_or(0);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(fields[3].as_raw().unwrap_or(&[0u8; 32]));

        let (payload, cover) = self.collect_fragments(total_size)?;
        // Image entries may have no hash recorded; integrity then relies on
        // fragment CRCs alone (§4.5 "Hash verification").
        if hash != [0u8; 32] {
            self.verify_hash(&hash, &payload)?;
        }
        self.inner.end_chunk()?;

        Ok(ReadEntry {
            kind: EntryKind::Image { device_path, mtime: std::time::SystemTime::UNIX_EPOCH, block_size, total_size, hash },
            cover,
            payload: Some(payload),
        })
    }

    fn read_directory_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self.inner.read_fixed(&[FieldSpec::Str16, FieldSpec::U32])?;
        let path = fields[0].as_str().unwrap_or_default().to_string();
        let permissions = fields[1].as_u64().unwrap_or(0) as u32;
        self.inner.end_chunk()?;
        let mut meta = placeholder_meta(path);
        meta.permissions = permissions;
        Ok(ReadEntry { kind: EntryKind::Directory { meta }, cover: CoverStatus::Complete, payload: None })
    }

    fn read_link_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self.inner.read_fixed(&[FieldSpec::Str16, FieldSpec::Str16, FieldSpec::U32])?;
        let path = fields[0].as_str().unwrap_or_default().to_string();
        let destination = fields[1].as_str().unwrap_or_default().to_string();
        let owner = fields[2].as_u64().unwrap_or(0) as u32;
        self.inner.end_chunk()?;
        Ok(ReadEntry { kind: EntryKind::Link { path, destination, owner }, cover: CoverStatus::Complete, payload: None })
    }

    fn read_hardlink_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self.inner.read_fixed(&[FieldSpec::U32, FieldSpec::U64, FieldSpec::Raw(32)])?;
        let count = fields[0].as_u64().unwrap_or(0);
        let size = fields[1].as_u64().unwrap_or(0);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(fields[2].as_raw().unwrap_or(&[0u8; 32]));

        let mut paths = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let f = self.inner.read_fixed(&[FieldSpec::Str16])?;
            paths.push(f[0].as_str().unwrap_or_default().to_string());
        }

        let (payload, cover) = self.collect_fragments(size)?;
        self.verify_hash(&hash, &payload)?;
        self.inner.end_chunk()?;

        Ok(ReadEntry {
            kind: EntryKind::Hardlink { paths, size, mtime: std::time::SystemTime::UNIX_EPOCH, owner: 0, group: 0, permissions: 0, hash },
            cover,
            payload: Some(payload),
        })
    }

    fn read_special_entry(&mut self) -> Result<ReadEntry, BarError> {
        let fields = self.inner.read_fixed(&[FieldSpec::Str16, FieldSpec::U8, FieldSpec::U32, FieldSpec::U32])?;
        let path = fields[0].as_str().unwrap_or_default().to_string();
        let kind = match fields[1].as_u64().unwrap_or(0) {
            0 => SpecialKind::Char,
            1 => SpecialKind::Block,
            2 => SpecialKind::Fifo,
            _ => SpecialKind::Socket,
        };
        let dev_major = fields[2].as_u64().unwrap_or(0) as u32;
        let dev_minor = fields[3].as_u64().unwrap_or(0) as u32;
        self.inner.end_chunk()?;
        Ok(ReadEntry {
            kind: EntryKind::Special { meta: placeholder_meta(path), kind, dev_major, dev_minor },
            cover: CoverStatus::Complete,
            payload: None,
        })
    }

    fn read_meta_entry(&mut self) -> Result<ReadEntry, BarError> {
        let count_fields = self.inner.read_fixed(&[FieldSpec::U32])?;
        let count = count_fields[0].as_u64().unwrap_or(0);
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let f = self.inner.read_fixed(&[FieldSpec::Str16, FieldSpec::Str16])?;
            annotations.push((f[0].as_str().unwrap_or_default().to_string(), f[1].as_str().unwrap_or_default().to_string()));
        }
        self.inner.end_chunk()?;
        Ok(ReadEntry { kind: EntryKind::Meta { annotations }, cover: CoverStatus::Complete, payload: None })
    }

    /// Reads every `FRAG`/`BFRG` child of the current container chunk,
    /// decrypting and decompressing each, and reports whether the union of
    /// fragment ranges exactly covers `[0, entry_size)` (I2, testable
    /// property 2).
    fn collect_fragments(&mut self, entry_size: u64) -> Result<(Vec<u8>, CoverStatus), BarError> {
        let mut out = vec![0u8; entry_size as usize];
        let mut covered_ranges: Vec<(u64, u64)> = Vec::new();

        while !self.inner.at_chunk_end()? {
            // Captured before `next_chunk` advances past the header, so it
            // matches the offset the writer derived its IV from — the
            // start of this fragment chunk's `id` byte, not its payload.
            let chunk_offset = self.absolute_offset()?;
            let frag_hdr = self
                .inner
                .next_chunk()?
                .ok_or_else(|| BarError::Entry("truncated entry: expected fragment".into()))?;
            let fields = self.inner.read_fixed(&[FieldSpec::U64, FieldSpec::U64, FieldSpec::U8, FieldSpec::U64])?;
            let offset = fields[0].as_u64().unwrap_or(0);
            let length = fields[1].as_u64().unwrap_or(0);
            let algo = CompressAlgorithm::from_tag(fields[2].as_u64().unwrap_or(0) as u8)?;

            let ciphertext = self.inner.read_payload_to_end()?;
            self.inner.end_chunk()?;

            let compressed = self.decrypt_first(chunk_offset, ciphertext)?;
            let plaintext = compress::decompress_payload(algo, &compressed)?;

            let start = offset as usize;
            let end = start.saturating_add(length as usize).min(out.len());
            if start < out.len() {
                let n = (end - start).min(plaintext.len());
                out[start..start + n].copy_from_slice(&plaintext[..n]);
            }
            covered_ranges.push((offset, offset + length));
            let _ = frag_hdr;
        }

        let cover = if covers_exactly(&mut covered_ranges, entry_size) {
            CoverStatus::Complete
        } else {
            CoverStatus::Partial
        };
        Ok((out, cover))
    }

    /// Decrypts one payload, mapping a CRC mismatch on the very first
    /// chunk decrypted under this key to `WrongPassword` (§4.2.1).
    fn decrypt_first(&mut self, chunk_offset: u64, ciphertext: Vec<u8>) -> Result<Vec<u8>, BarError> {
        let crypt = match &self.crypt {
            Some(c) => c,
            None => return Ok(ciphertext),
        };
        let result = crypt.decrypt_chunk(chunk_offset, &ciphertext);
        if !self.crc_checked {
            self.crc_checked = true;
            return result.map_err(crypto::classify_first_chunk_error);
        }
        result
    }

    fn verify_hash(&self, expected: &[u8; 32], payload: &[u8]) -> Result<(), BarError> {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let actual = hasher.finish();
        if &actual != expected {
            return Err(ChunkError::CrcMismatch.into());
        }
        Ok(())
    }
}

/// Verifies a part's trailing `SIG0` signature against every byte written
/// before it (§4.2 "Signatures"). Walks the part independently of entry
/// iteration since a signature check should succeed even against an
/// archive whose entries the caller doesn't otherwise care to read.
pub fn verify_part_signature<S: StorageAdapter>(
    mut storage: S,
    name: &str,
    verifying_key: &VerifyingKey,
) -> Result<(), BarError> {
    storage.open(name, OpenMode::Read)?;
    let mut reader = ChunkReader::new(StorageIo::new(storage));
    let mut prefix_len = 0u64;
    loop {
        let hdr = reader
            .next_chunk()?
            .ok_or_else(|| BarError::Entry("no SIG0 chunk found in part".into()))?;
        if hdr.id == crate::chunk::ids::SIG0 {
            let signature = reader.read_payload_to_end()?;
            let mut storage = reader.into_inner().into_inner();
            storage.seek(std::io::SeekFrom::Start(0))?;
            let mut prefix = vec![0u8; prefix_len as usize];
            let mut read = 0usize;
            while read < prefix.len() {
                let n = storage.read(&mut prefix[read..])?;
                if n == 0 {
                    break;
                }
                read += n;
            }
            prefix.truncate(read);
            return verifying_key.verify_prefix(&prefix, &signature);
        }
        reader.skip_remainder()?;
        prefix_len += crate::chunk::HEADER_LEN + hdr.size;
    }
}

fn covers_exactly(ranges: &mut [(u64, u64)], size: u64) -> bool {
    ranges.sort_by_key(|r| r.0);
    let mut expected = 0u64;
    for &(start, end) in ranges.iter() {
        if start != expected {
            return false;
        }
        expected = end;
    }
    expected == size
}

fn is_known_entry_chunk(id: ChunkId) -> bool {
    id == crate::chunk::ids::FILE
        || id == crate::chunk::ids::IMGE
        || id == crate::chunk::ids::DIRE
        || id == crate::chunk::ids::LINK
        || id == crate::chunk::ids::HLNK
        || id == crate::chunk::ids::SPEC
        || id == crate::chunk::ids::META
}

fn placeholder_meta(path: String) -> crate::archive::EntryMetadata {
    crate::archive::EntryMetadata {
        path,
        mtime: std::time::SystemTime::UNIX_EPOCH,
        owner: 0,
        group: 0,
        permissions: 0,
        attrs: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::writer::{ArchiveOptions, ArchiveWriter, FragmentInput};
    use crate::archive::entry::EntryMetadata;
    use crate::crypto::{CipherAlgorithm, Password};
    use crate::storage::local::LocalStorage;

    fn sha256(bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finish()
    }

    fn meta(path: &str) -> EntryMetadata {
        EntryMetadata {
            path: path.to_string(),
            mtime: std::time::SystemTime::UNIX_EPOCH,
            owner: 0,
            group: 0,
            permissions: 0o644,
            attrs: 0,
        }
    }

    #[test]
    fn encrypted_multi_entry_archive_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let password = Password::new(b"hunter2hunter2".to_vec()).unwrap();
        let salt = vec![0x42u8; 16];
        let writer_crypt = CryptConfig::from_password(CipherAlgorithm::Aes256, &password, salt.clone()).unwrap();

        let mut options = ArchiveOptions::default();
        options.crypt = Some(writer_crypt);

        let payload_a = b"first entry's payload, short and simple".to_vec();
        let payload_b = b"second entry's payload, deliberately longer than the first one to exercise a different chunk offset".to_vec();

        let mut writer =
            ArchiveWriter::begin("set-rt".to_string(), options, move || LocalStorage::new(root.clone())).unwrap();
        writer
            .write_entry(
                EntryKind::File { meta: meta("/a.txt"), size: payload_a.len() as u64, hash: sha256(&payload_a) },
                vec![FragmentInput { offset: 0, length: payload_a.len() as u64, data: payload_a.clone(), is_image_block: false }],
            )
            .unwrap();
        writer
            .write_entry(
                EntryKind::File { meta: meta("/b.txt"), size: payload_b.len() as u64, hash: sha256(&payload_b) },
                vec![FragmentInput { offset: 0, length: payload_b.len() as u64, data: payload_b.clone(), is_image_block: false }],
            )
            .unwrap();
        writer.end().unwrap();

        let reader_crypt = CryptConfig::from_password(CipherAlgorithm::Aes256, &password, salt).unwrap();
        let storage = LocalStorage::new(dir.path());
        let mut reader = ArchiveReader::open(storage, "set-rt.000", Some(reader_crypt)).unwrap();

        let first = reader.next_entry(&ReadOptions::default()).unwrap().unwrap();
        assert_eq!(first.kind.path(), Some("/a.txt"));
        assert_eq!(first.payload.unwrap(), payload_a);
        assert_eq!(first.cover, CoverStatus::Complete);

        let second = reader.next_entry(&ReadOptions::default()).unwrap().unwrap();
        assert_eq!(second.kind.path(), Some("/b.txt"));
        assert_eq!(second.payload.unwrap(), payload_b);

        assert!(reader.next_entry(&ReadOptions::default()).unwrap().is_none());
    }

    #[test]
    fn selection_skips_excluded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let mut writer =
            ArchiveWriter::begin("set-sel".to_string(), ArchiveOptions::default(), move || LocalStorage::new(root.clone()))
                .unwrap();
        for name in ["/keep.txt", "/skip.txt"] {
            let payload = format!("contents of {}", name).into_bytes();
            writer
                .write_entry(
                    EntryKind::File { meta: meta(name), size: payload.len() as u64, hash: sha256(&payload) },
                    vec![FragmentInput { offset: 0, length: payload.len() as u64, data: payload, is_image_block: false }],
                )
                .unwrap();
        }
        writer.end().unwrap();

        let storage = LocalStorage::new(dir.path());
        let mut reader = ArchiveReader::open(storage, "set-sel.000", None).unwrap();
        let options = ReadOptions { includes: vec![], excludes: vec![("/skip.txt".to_string(), PatternKind::Glob)] };

        let first = reader.next_entry(&options).unwrap().unwrap();
        assert_eq!(first.kind.path(), Some("/keep.txt"));
        assert!(reader.next_entry(&options).unwrap().is_none());
    }

    #[test]
    fn signed_part_verifies_and_tampering_is_detected() {
        use crate::crypto::signature::SigningKey;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let signing_key = SigningKey::generate();
        let verifying_key = crate::crypto::signature::VerifyingKey::from_bytes(&signing_key.public_bytes()).unwrap();

        let mut options = ArchiveOptions::default();
        options.signing_key = Some(signing_key);
        let mut writer =
            ArchiveWriter::begin("set-sig".to_string(), options, move || LocalStorage::new(root.clone())).unwrap();
        let payload = b"signed archive contents".to_vec();
        writer
            .write_entry(
                EntryKind::File { meta: meta("/x.bin"), size: payload.len() as u64, hash: sha256(&payload) },
                vec![FragmentInput { offset: 0, length: payload.len() as u64, data: payload, is_image_block: false }],
            )
            .unwrap();
        writer.end().unwrap();

        let storage = LocalStorage::new(dir.path());
        verify_part_signature(storage, "set-sig.000", &verifying_key).unwrap();

        // Tamper with a byte at the very start of the part (well before
        // SIG0), so the signature must no longer verify against the
        // (now different) prefix bytes.
        let path = dir.path().join("set-sig.000");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let storage = LocalStorage::new(dir.path());
        assert!(verify_part_signature(storage, "set-sig.000", &verifying_key).is_err());
    }

    #[test]
    fn glob_translates_star_and_question_mark() {
        let re = glob_to_regex("*.txt");
        assert_eq!(re, ".*\\.txt");
        let re = glob_to_regex("file?.bin");
        assert_eq!(re, "file.\\.bin");
    }

    #[test]
    fn include_prefix_and_exclude_exact_semantics() {
        let options = ReadOptions {
            includes: vec![("/etc".to_string(), PatternKind::Glob)],
            excludes: vec![("/etc/shadow".to_string(), PatternKind::Glob)],
        };
        assert!(options.accepts("/etc/hosts").unwrap());
        assert!(!options.accepts("/etc/shadow").unwrap());
        assert!(!options.accepts("/var/log/syslog").unwrap());
    }

    #[test]
    fn covers_exactly_detects_gap_and_exact_cover() {
        let mut exact = vec![(0u64, 10u64), (10, 20)];
        assert!(covers_exactly(&mut exact, 20));

        let mut gap = vec![(0u64, 10u64), (15, 20)];
        assert!(!covers_exactly(&mut gap, 20));
    }
}
