//! Archive writer & reader (C4/C5, spec §4.4, §4.5).

pub mod entry;
pub mod fragment;
pub mod index_catalog;
pub mod reader;
pub mod writer;

pub use entry::{CoverStatus, EntryKind, EntryMetadata, SpecialKind};
pub use fragment::{DeltaSourceRef, FragmentHeader};
pub use index_catalog::{CatalogEntry, IndexCatalogBuilder};
pub use reader::{verify_part_signature, ArchiveReader, PatternKind, ReadEntry, ReadOptions};
pub use writer::{ArchiveOptions, ArchiveWriter};

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::storage::StorageAdapter;

/// How `ArchiveWriter::begin` behaves when its target name already exists
/// (§4.4 "Write modes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFileMode {
    Stop,
    Rename,
    Append,
    Overwrite,
}

/// Bridges a [`StorageAdapter`] (which reports `BarError`) to the
/// `std::io::{Read,Write,Seek}` traits [`crate::chunk::ChunkWriter`] and
/// [`crate::chunk::ChunkReader`] are generic over.
pub(crate) struct StorageIo<S: StorageAdapter> {
    pub storage: S,
}

impl<S: StorageAdapter> StorageIo<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

fn to_io_error(err: crate::error::BarError) -> io::Error {
    match err {
        crate::error::BarError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

impl<S: StorageAdapter> Read for StorageIo<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.storage.read(buf).map_err(to_io_error)
    }
}

impl<S: StorageAdapter> Write for StorageIo<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.storage.write(buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: StorageAdapter> Seek for StorageIo<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.storage.seek(pos).map_err(to_io_error)
    }
}
