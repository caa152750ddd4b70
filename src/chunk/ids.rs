//! The 4-byte ASCII chunk identifiers defined in §6.1.

/// A chunk identifier: four printable ASCII bytes.
pub type ChunkId = [u8; 4];

pub const BAR0: ChunkId = *b"BAR0";
pub const META: ChunkId = *b"META";
pub const FILE: ChunkId = *b"FILE";
pub const IMGE: ChunkId = *b"IMGE";
pub const DIRE: ChunkId = *b"DIRE";
pub const LINK: ChunkId = *b"LINK";
pub const HLNK: ChunkId = *b"HLNK";
pub const SPEC: ChunkId = *b"SPEC";
pub const FRAG: ChunkId = *b"FRAG";
pub const BFRG: ChunkId = *b"BFRG";
pub const KEY0: ChunkId = *b"KEY0";
pub const SALT: ChunkId = *b"SALT";
pub const IDX0: ChunkId = *b"IDX0";
pub const SIG0: ChunkId = *b"SIG0";

/// All chunk ids the resync scanner (§4.1 "Key algorithm") is allowed to
/// recognize as a legal re-synchronization point. An id that isn't in this
/// table can still appear as a legal *unknown* chunk (I1) during ordinary
/// forward parsing, but the corruption scanner must not stop on it, since it
/// has no way to confirm the match isn't coincidental payload bytes.
pub const KNOWN_IDS: &[ChunkId] = &[
    BAR0, META, FILE, IMGE, DIRE, LINK, HLNK, SPEC, FRAG, BFRG, KEY0, SALT, IDX0, SIG0,
];

pub fn is_known(id: &ChunkId) -> bool {
    KNOWN_IDS.contains(id)
}

/// Renders a chunk id for diagnostics, falling back to a hex dump for
/// non-ASCII bytes (which should never occur in a well-formed archive).
pub fn id_to_string(id: &ChunkId) -> String {
    if id.iter().all(|b| b.is_ascii_graphic()) {
        String::from_utf8_lossy(id).into_owned()
    } else {
        format!("{:02x}{:02x}{:02x}{:02x}", id[0], id[1], id[2], id[3])
    }
}
