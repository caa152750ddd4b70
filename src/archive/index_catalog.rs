//! The end-of-archive `IDX0` catalog: `(entry-name, offset)` pairs for
//! random access, built up alongside the primary write stream the same way
//! the teacher accumulates an index structure while writing a datastore
//! (`backup.rs`), just scoped to one archive part instead of a whole
//! datastore.

use crate::chunk::{ChunkWriter, FieldValue};
use crate::error::BarError;
use std::io::{Seek, Write};

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub offset: u64,
}

#[derive(Debug, Default)]
pub struct IndexCatalogBuilder {
    entries: Vec<CatalogEntry>,
}

impl IndexCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: String, offset: u64) {
        self.entries.push(CatalogEntry { name, offset });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the accumulated entries as one `IDX0` chunk.
    pub fn write<W: Write + Seek>(&self, writer: &mut ChunkWriter<W>) -> Result<(), BarError> {
        // No trailing payload CRC: IDX0 carries only fixed fields (a
        // repeated name/offset pair per entry), so it's written as a
        // container chunk like FILE/DIRE rather than a leaf like FRAG.
        writer.begin_chunk(crate::chunk::ids::IDX0, true)?;
        writer.write_fixed(&[FieldValue::U32(self.entries.len() as u32)])?;
        for entry in &self.entries {
            writer.write_fixed(&[
                FieldValue::Str16(entry.name.clone()),
                FieldValue::U64(entry.offset),
            ])?;
        }
        writer.end_chunk()?;
        Ok(())
    }

    /// Reads back an `IDX0` chunk's fixed-field payload (caller has already
    /// consumed the chunk header via `ChunkReader::next_chunk`).
    pub fn read<R: std::io::Read + Seek>(
        reader: &mut crate::chunk::ChunkReader<R>,
    ) -> Result<Vec<CatalogEntry>, BarError> {
        let count_fields = reader.read_fixed(&[crate::chunk::FieldSpec::U32])?;
        let count = count_fields[0].as_u64().unwrap_or(0);
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let fields = reader.read_fixed(&[crate::chunk::FieldSpec::Str16, crate::chunk::FieldSpec::U64])?;
            entries.push(CatalogEntry {
                name: fields[0].as_str().unwrap_or_default().to_string(),
                offset: fields[1].as_u64().unwrap_or(0),
            });
        }
        reader.end_chunk()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn catalog_round_trips_through_a_chunk() {
        let mut builder = IndexCatalogBuilder::new();
        builder.record("etc/hosts".into(), 128);
        builder.record("etc/fstab".into(), 4096);

        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = ChunkWriter::new(&mut buf);
            builder.write(&mut w).unwrap();
        }

        buf.set_position(0);
        let mut r = crate::chunk::ChunkReader::new(&mut buf);
        let hdr = r.next_chunk().unwrap().unwrap();
        assert_eq!(hdr.id, crate::chunk::ids::IDX0);
        let entries = IndexCatalogBuilder::read(&mut r).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "etc/hosts");
        assert_eq!(entries[1].offset, 4096);
    }
}
