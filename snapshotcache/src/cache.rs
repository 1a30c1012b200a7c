//! `snapshotcache.data` + `snapshotcache.index`: a derived, restartable
//! index into a journal (spec.md §4.2/§6).

use crate::entity::{read_entity, write_entity, Entity};
use crate::error::Error;
use crate::header::{CacheHeader, IndexEntry, DATA_MAGIC, HEADER_SIZE, INDEX_ENTRY_SIZE, INDEX_MAGIC};
use model::Snapshot;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use wire::leb128;

type Result<T> = std::result::Result<T, Error>;

pub struct SnapshotCache {
    data: fs::File,
    index: fs::File,
    insignia: u64,
    data_end: u64,
}

impl SnapshotCache {
    pub fn create<P: AsRef<Path>>(data_path: P, index_path: P, insignia: u64) -> Result<Self> {
        let mut data = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(data_path)?;
        let mut index = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(index_path)?;
        CacheHeader { insignia }.write_to(DATA_MAGIC, &mut data)?;
        CacheHeader { insignia }.write_to(INDEX_MAGIC, &mut index)?;
        Ok(Self {
            data,
            index,
            insignia,
            data_end: HEADER_SIZE,
        })
    }

    /// Opens an existing cache, validating that both files' insignia
    /// agree (spec invariant 4). Any mismatch is treated as "unusable":
    /// the caller should discard this cache and replay the journal from
    /// scratch.
    pub fn open<P: AsRef<Path>>(data_path: P, index_path: P, expected_insignia: u64) -> Result<Self> {
        let mut data = fs::OpenOptions::new().read(true).write(true).open(data_path)?;
        let mut index = fs::OpenOptions::new().read(true).write(true).open(index_path)?;
        let data_header = CacheHeader::read_from(DATA_MAGIC, &mut data)?;
        let index_header = CacheHeader::read_from(INDEX_MAGIC, &mut index)?;
        if data_header.insignia != index_header.insignia || data_header.insignia != expected_insignia
        {
            return Err(Error::InsigniaMismatch);
        }
        let data_end = data.seek(SeekFrom::End(0))?;
        Ok(Self {
            data,
            index,
            insignia: expected_insignia,
            data_end,
        })
    }

    pub fn insignia(&self) -> u64 {
        self.insignia
    }

    fn index_entry_count(&mut self) -> Result<u64> {
        let len = self.index.seek(SeekFrom::End(0))?;
        if len < HEADER_SIZE {
            return Ok(0);
        }
        Ok((len - HEADER_SIZE) / INDEX_ENTRY_SIZE)
    }

    fn read_index_entry(&mut self, i: u64) -> Result<IndexEntry> {
        self.index
            .seek(SeekFrom::Start(HEADER_SIZE + i * INDEX_ENTRY_SIZE))?;
        IndexEntry::read_from(&mut self.index)
    }

    fn last_index_entry(&mut self) -> Result<Option<IndexEntry>> {
        let count = self.index_entry_count()?;
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(self.read_index_entry(count - 1)?))
    }

    /// Restores the latest snapshot, returning it along with the journal
    /// offset the caller should resume replaying from.
    pub fn restore(&mut self) -> Result<(Snapshot, u64)> {
        let entry = self.last_index_entry()?.ok_or(Error::EmptyIndex)?;
        let offsets = self.read_manifest(entry.manifest_offset)?;
        let mut snapshot = Snapshot::new();
        for offset in offsets {
            self.data.seek(SeekFrom::Start(offset))?;
            match read_entity(&mut self.data)? {
                Entity::Book(b) => snapshot.books.push(b),
                Entity::Document(d) => snapshot.documents.push(d),
                Entity::MimState(m) => snapshot.mim_states.push(m),
            }
        }
        Ok((snapshot, entry.journal_offset))
    }

    fn read_manifest(&mut self, offset: u64) -> Result<Vec<u64>> {
        self.data.seek(SeekFrom::Start(offset))?;
        let mut out = Vec::new();
        for _ in 0..3 {
            let count = read_varint_u64(&mut self.data)?;
            for _ in 0..count {
                out.push(read_varint_u64(&mut self.data)?);
            }
        }
        Ok(out)
    }

    /// Writes a fresh copy of every book, document and mim-state (not
    /// just the ones created since the last push — a document's *content*
    /// can change between pushes even though its identity doesn't), then
    /// a manifest over the full entity set, then appends an index entry.
    /// Called by the host whenever the journal has grown past the push
    /// threshold since the last call (spec.md §4.2 push policy).
    pub fn push(&mut self, snapshot: &mut Snapshot, journal_offset: u64, timestamp_us: i64) -> Result<()> {
        for book in snapshot.books.iter_mut() {
            let offset = self.data_end;
            self.data.seek(SeekFrom::Start(offset))?;
            write_entity(&mut self.data, &Entity::Book(*book))?;
            self.data_end = self.data.stream_position()?;
            book.snapshotcache_offset = offset.max(1);
        }
        for doc in snapshot.documents.iter_mut() {
            let offset = self.data_end;
            self.data.seek(SeekFrom::Start(offset))?;
            write_entity(&mut self.data, &Entity::Document(doc.clone()))?;
            self.data_end = self.data.stream_position()?;
            doc.snapshotcache_offset = offset.max(1);
        }
        for state in snapshot.mim_states.iter_mut() {
            let offset = self.data_end;
            self.data.seek(SeekFrom::Start(offset))?;
            write_entity(&mut self.data, &Entity::MimState(state.clone()))?;
            self.data_end = self.data.stream_position()?;
            state.snapshotcache_offset = offset.max(1);
        }

        let manifest_offset = self.data_end;
        self.data.seek(SeekFrom::Start(manifest_offset))?;
        write_varint_u64(&mut self.data, snapshot.books.len() as u64)?;
        for b in &snapshot.books {
            write_varint_u64(&mut self.data, b.snapshotcache_offset)?;
        }
        write_varint_u64(&mut self.data, snapshot.documents.len() as u64)?;
        for d in &snapshot.documents {
            write_varint_u64(&mut self.data, d.snapshotcache_offset)?;
        }
        write_varint_u64(&mut self.data, snapshot.mim_states.len() as u64)?;
        for m in &snapshot.mim_states {
            write_varint_u64(&mut self.data, m.snapshotcache_offset)?;
        }
        self.data.flush()?;
        self.data_end = self.data.stream_position()?;

        self.index.seek(SeekFrom::End(0))?;
        IndexEntry {
            timestamp: timestamp_us as u64,
            manifest_offset,
            journal_offset,
        }
        .write_to(&mut self.index)?;
        self.index.flush()?;
        tracing::debug!(journal_offset, manifest_offset, "pushed snapshot cache");
        Ok(())
    }
}

fn write_varint_u64<W: Write>(w: W, v: u64) -> Result<()> {
    leb128::write_u64(w, v).map_err(Into::into)
}

fn read_varint_u64<R: Read>(r: R) -> Result<u64> {
    leb128::read_u64(r).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Book, Document, Fundament, MimState};
    use tempfile::tempdir;

    #[test]
    fn push_then_restore_roundtrips() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("snapshotcache.data");
        let index_path = dir.path().join("snapshotcache.index");
        let mut cache = SnapshotCache::create(&data_path, &index_path, 42).unwrap();

        let mut snapshot = Snapshot::new();
        snapshot.books.push(Book::new(1, Fundament::MieUrlyd));
        snapshot
            .documents
            .push(Document::new(1, 1, "art.mie".into()));
        snapshot.mim_states.push(MimState::new(1, 1, 1, 1));

        cache.push(&mut snapshot, 1000, 123).unwrap();

        let mut reopened = SnapshotCache::open(&data_path, &index_path, 42).unwrap();
        let (restored, journal_offset) = reopened.restore().unwrap();
        assert_eq!(journal_offset, 1000);
        assert_eq!(restored.books.len(), 1);
        assert_eq!(restored.documents.len(), 1);
        assert_eq!(restored.mim_states.len(), 1);
        assert_eq!(restored.documents[0].name, "art.mie");
    }

    #[test]
    fn wrong_insignia_is_rejected() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("snapshotcache.data");
        let index_path = dir.path().join("snapshotcache.index");
        SnapshotCache::create(&data_path, &index_path, 42).unwrap();
        assert!(matches!(
            SnapshotCache::open(&data_path, &index_path, 7),
            Err(Error::InsigniaMismatch)
        ));
    }
}
