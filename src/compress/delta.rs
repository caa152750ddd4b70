//! Delta filter (C3a, spec §4.3 "Delta filter"), a from-scratch stand-in for
//! xdelta3: no xdelta3 binding exists anywhere in the retrieval pack (it's a
//! C library with no maintained Rust wrapper), so this is a content-defined
//! rolling-hash matcher against a reference source stream — same family of
//! technique as a content-defined chunker, generalized from "split into
//! chunks" to "find copy-ranges against a reference".

use std::collections::HashMap;

use crate::error::BarError;

const BLOCK_SIZE: usize = 64;
/// Adler-32-style modulus, large enough to keep weak-hash collisions rare
/// for the block sizes this filter works with.
const MOD_ADLER: u32 = 65521;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `len` bytes from the reference source starting at `src_offset`.
    Copy { src_offset: u64, len: u64 },
    /// Literal bytes not found in the reference source.
    Insert { bytes: Vec<u8> },
}

struct RollingHash {
    a: u32,
    b: u32,
    window: usize,
}

impl RollingHash {
    fn new(initial: &[u8]) -> Self {
        let mut a = 1u32;
        let mut b = 0u32;
        for &byte in initial {
            a = (a + byte as u32) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }
        Self { a, b, window: initial.len() }
    }

    fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Rolls the window forward by one byte: `old` leaves, `new` enters.
    fn roll(&mut self, old: u8, new: u8) {
        self.a = (self.a + MOD_ADLER - (old as u32 % MOD_ADLER) + new as u32) % MOD_ADLER;
        self.b = (self.b + MOD_ADLER
            - ((self.window as u32 * old as u32) % MOD_ADLER)
            + self.a)
            % MOD_ADLER;
    }
}

/// Indexes every `BLOCK_SIZE`-aligned block of `source` by its rolling hash,
/// so the scan over `target` can look up candidate match offsets in O(1).
fn index_source(source: &[u8]) -> HashMap<u32, Vec<usize>> {
    let mut index: HashMap<u32, Vec<usize>> = HashMap::new();
    if source.len() < BLOCK_SIZE {
        return index;
    }
    let mut offset = 0;
    while offset + BLOCK_SIZE <= source.len() {
        let hash = RollingHash::new(&source[offset..offset + BLOCK_SIZE]).value();
        index.entry(hash).or_default().push(offset);
        offset += BLOCK_SIZE;
    }
    index
}

fn extend_match(source: &[u8], target: &[u8], src_start: usize, tgt_start: usize) -> usize {
    let mut len = 0;
    while src_start + len < source.len()
        && tgt_start + len < target.len()
        && source[src_start + len] == target[tgt_start + len]
    {
        len += 1;
    }
    len
}

/// Produces a `{Copy|Insert}` op stream that reconstructs `target` given
/// `source` (§4.3 "Delta filter"). If `source` is too short to index at all,
/// the whole of `target` comes back as one `Insert` — callers treat that the
/// same as "source unavailable" (§4.3.1's identity-degradation rule).
pub fn diff(source: &[u8], target: &[u8]) -> Vec<DeltaOp> {
    let index = index_source(source);
    if index.is_empty() {
        return vec![DeltaOp::Insert { bytes: target.to_vec() }];
    }

    let mut ops = Vec::new();
    let mut pending_insert: Vec<u8> = Vec::new();
    let mut pos = 0usize;

    while pos < target.len() {
        if pos + BLOCK_SIZE > target.len() {
            pending_insert.extend_from_slice(&target[pos..]);
            break;
        }

        let hash = RollingHash::new(&target[pos..pos + BLOCK_SIZE]).value();
        let best_match = index.get(&hash).and_then(|candidates| {
            candidates
                .iter()
                .map(|&src_offset| (src_offset, extend_match(source, target, src_offset, pos)))
                .filter(|&(_, len)| len >= BLOCK_SIZE)
                .max_by_key(|&(_, len)| len)
        });

        match best_match {
            Some((src_offset, len)) => {
                if !pending_insert.is_empty() {
                    ops.push(DeltaOp::Insert { bytes: std::mem::take(&mut pending_insert) });
                }
                ops.push(DeltaOp::Copy { src_offset: src_offset as u64, len: len as u64 });
                pos += len;
            }
            None => {
                pending_insert.push(target[pos]);
                pos += 1;
            }
        }
    }

    if !pending_insert.is_empty() {
        ops.push(DeltaOp::Insert { bytes: pending_insert });
    }
    ops
}

/// Reconstructs the original target bytes from a `diff` op stream.
pub fn apply(source: &[u8], ops: &[DeltaOp]) -> Result<Vec<u8>, BarError> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            DeltaOp::Copy { src_offset, len } => {
                let start = *src_offset as usize;
                let end = start
                    .checked_add(*len as usize)
                    .ok_or_else(|| BarError::Compress("delta copy range overflow".into()))?;
                let slice = source
                    .get(start..end)
                    .ok_or_else(|| BarError::Compress("delta copy range out of bounds".into()))?;
                out.extend_from_slice(slice);
            }
            DeltaOp::Insert { bytes } => out.extend_from_slice(bytes),
        }
    }
    Ok(out)
}
