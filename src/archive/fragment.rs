//! Fragments — the chunked payload carriers for FILE/IMAGE/HARDLINK
//! entries (§3 "A fragment encodes...").

use crate::compress::CompressAlgorithm;

/// An optional reference to a prior archive's matching entry, used by the
/// delta filter (C3a) to encode this fragment as copy/insert ops against
/// that source instead of storing it whole.
#[derive(Debug, Clone)]
pub struct DeltaSourceRef {
    pub source_path_hash: [u8; 32],
}

/// One fragment's header fields, written into the `FRAG`/`BFRG` chunk's
/// fixed fields ahead of its (possibly compressed, possibly encrypted)
/// payload bytes.
#[derive(Debug, Clone)]
pub struct FragmentHeader {
    pub offset: u64,
    pub length: u64,
    pub delta_source: Option<DeltaSourceRef>,
    pub compress_algorithm: CompressAlgorithm,
    pub compressed_length: u64,
}

impl FragmentHeader {
    pub fn chunk_id(is_image_block: bool) -> crate::chunk::ChunkId {
        if is_image_block {
            crate::chunk::ids::BFRG
        } else {
            crate::chunk::ids::FRAG
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_header_picks_the_right_chunk_family() {
        assert_eq!(FragmentHeader::chunk_id(false), crate::chunk::ids::FRAG);
        assert_eq!(FragmentHeader::chunk_id(true), crate::chunk::ids::BFRG);
    }
}
