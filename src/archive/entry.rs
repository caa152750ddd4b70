//! Archive entry kinds and metadata (§3 "Data model").

use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    Char,
    Block,
    Fifo,
    Socket,
}

/// Fields common to every entry kind, plus the kind-specific ones the
/// writer/reader pack into the matching chunk's fixed fields (§3's
/// per-kind field table).
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    pub path: String,
    pub mtime: SystemTime,
    pub owner: u32,
    pub group: u32,
    pub permissions: u32,
    pub attrs: u32,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    File {
        meta: EntryMetadata,
        size: u64,
        hash: [u8; 32],
    },
    Image {
        device_path: String,
        mtime: SystemTime,
        block_size: u32,
        total_size: u64,
        hash: [u8; 32],
    },
    Directory {
        meta: EntryMetadata,
    },
    Link {
        path: String,
        destination: String,
        owner: u32,
    },
    Hardlink {
        paths: Vec<String>,
        size: u64,
        mtime: SystemTime,
        owner: u32,
        group: u32,
        permissions: u32,
        hash: [u8; 32],
    },
    Special {
        meta: EntryMetadata,
        kind: SpecialKind,
        dev_major: u32,
        dev_minor: u32,
    },
    Meta {
        annotations: Vec<(String, String)>,
    },
}

impl EntryKind {
    /// The chunk id this entry kind is written/read as (§6.1).
    pub fn chunk_id(&self) -> crate::chunk::ChunkId {
        match self {
            EntryKind::File { .. } => crate::chunk::ids::FILE,
            EntryKind::Image { .. } => crate::chunk::ids::IMGE,
            EntryKind::Directory { .. } => crate::chunk::ids::DIRE,
            EntryKind::Link { .. } => crate::chunk::ids::LINK,
            EntryKind::Hardlink { .. } => crate::chunk::ids::HLNK,
            EntryKind::Special { .. } => crate::chunk::ids::SPEC,
            EntryKind::Meta { .. } => crate::chunk::ids::META,
        }
    }

    /// Whether this entry kind carries fragment children (§3's "Child
    /// payload" column): FILE, IMAGE and HARDLINK do; the rest don't.
    pub fn is_container(&self) -> bool {
        matches!(self, EntryKind::File { .. } | EntryKind::Image { .. } | EntryKind::Hardlink { .. })
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            EntryKind::File { meta, .. } => Some(&meta.path),
            EntryKind::Directory { meta } => Some(&meta.path),
            EntryKind::Link { path, .. } => Some(path),
            EntryKind::Hardlink { paths, .. } => paths.first().map(|s| s.as_str()),
            EntryKind::Special { meta, .. } => Some(&meta.path),
            EntryKind::Image { device_path, .. } => Some(device_path),
            EntryKind::Meta { .. } => None,
        }
    }

    pub fn logical_size(&self) -> u64 {
        match self {
            EntryKind::File { size, .. } => *size,
            EntryKind::Image { total_size, .. } => *total_size,
            EntryKind::Hardlink { size, .. } => *size,
            _ => 0,
        }
    }
}

/// Reported alongside an entry when a reader validates chunk-cover (I2):
/// the entry is marked partial rather than failing outright when fragments
/// don't add up to an exact `[0, size)` cover, matching §3's explicit
/// "unless the entry is marked partial" escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStatus {
    Complete,
    Partial,
}
