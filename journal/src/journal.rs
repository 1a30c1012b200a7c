//! Append-only `DOJO0001` journal.

use crate::error::Error;
use crate::header::{Header, HEADER_SIZE};
use crate::ringbuf::RingBuffer;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path;

type Result<T> = std::result::Result<T, Error>;

const DEFAULT_RING_CAPACITY: usize = 1 << 20; // 1 MiB, power of two

/// A single committed entry, as replayed from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ts_us: i64,
    pub artist_id: u64,
    pub session_id: u64,
    pub tracer: u64,
    pub mim: Vec<u8>,
}

pub const SYNC: u8 = wire::SYNC;

impl Entry {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(16 + self.mim.len());
        buf.push(SYNC);
        wire::leb128::write_i64(&mut buf, self.ts_us)?;
        wire::leb128::write_u64(&mut buf, self.artist_id)?;
        wire::leb128::write_u64(&mut buf, self.session_id)?;
        wire::leb128::write_u64(&mut buf, self.tracer)?;
        wire::leb128::write_u64(&mut buf, self.mim.len() as u64)?;
        buf.extend_from_slice(&self.mim);
        Ok(buf)
    }
}

#[derive(Debug)]
pub struct Journal<F = fs::File>
where
    F: Read + Write + Seek,
{
    header: Header,
    fd: F,
    /// logical end of journal, including bytes still only resident in `ring`
    size: u64,
    /// absolute offset up to which `fd` has actually been written
    flushed_upto: u64,
    ring: RingBuffer,
    sync_on_append: bool,
}

impl Journal<fs::File> {
    /// Create a new journal file with a random insignia.
    pub fn create<P: AsRef<path::Path>>(p: P) -> Result<Self> {
        let mut fd = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(p.as_ref())?;
        let insignia = random_insignia();
        let header = Header::new(insignia);
        header.write_to(&mut fd)?;
        fd.flush()?;
        tracing::info!(insignia, path = %p.as_ref().display(), "created journal");
        Ok(Self {
            header,
            fd,
            size: HEADER_SIZE,
            flushed_upto: HEADER_SIZE,
            ring: RingBuffer::new(DEFAULT_RING_CAPACITY, HEADER_SIZE),
            sync_on_append: false,
        })
    }

    /// Open an existing journal file, validating its header.
    pub fn try_from<P: AsRef<path::Path>>(p: P) -> Result<Self> {
        let mut fd = fs::OpenOptions::new().write(true).read(true).open(p)?;
        let header = Header::read_from(&mut fd)?;
        let size = fd.seek(SeekFrom::End(0))?;
        Ok(Self {
            header,
            fd,
            size,
            flushed_upto: size,
            ring: RingBuffer::new(DEFAULT_RING_CAPACITY, size),
            sync_on_append: false,
        })
    }
}

impl<F: Read + Write + Seek> Journal<F> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn insignia(&self) -> u64 {
        self.header.insignia
    }

    /// Current logical size of the journal, including bytes appended but
    /// not yet flushed to disk.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_sync_on_append(&mut self, sync: bool) {
        self.sync_on_append = sync;
    }

    /// Appends one framed entry and returns its starting offset.
    /// Visible via `size()`/`pread()` immediately; durable only after
    /// `flush()` (and `fsync` if `sync_on_append` is set).
    pub fn append(
        &mut self,
        ts_us: i64,
        artist_id: u64,
        session_id: u64,
        tracer: u64,
        mim: &[u8],
    ) -> Result<u64> {
        let entry = Entry {
            ts_us,
            artist_id,
            session_id,
            tracer,
            mim: mim.to_vec(),
        };
        let bytes = entry.encode()?;
        let offset = self.size;
        self.ring.push(&bytes)?;
        self.size += bytes.len() as u64;
        if self.sync_on_append {
            self.flush()?;
            self.fd.flush()?;
        }
        Ok(offset)
    }

    /// Writes everything resident in the ring to disk and frees that
    /// room. Never blocks the append path on its own (it's driven by the
    /// host tick, not invoked from within `append`).
    pub fn flush(&mut self) -> Result<()> {
        let resident = self.ring.resident_bytes();
        if resident.is_empty() {
            return Ok(());
        }
        self.fd.seek(SeekFrom::Start(self.flushed_upto))?;
        self.fd.write_all(&resident)?;
        self.flushed_upto += resident.len() as u64;
        self.ring.advance_base(resident.len());
        Ok(())
    }

    /// Reads `len` bytes at `offset`, serving from the in-memory ring
    /// when possible and falling back to a positional file read.
    pub fn pread(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if let Some(bytes) = self.ring.read_range(offset, len) {
            return Ok(bytes);
        }
        if offset + len as u64 > self.flushed_upto {
            // overlaps unflushed-and-evicted-from-ring data: force a flush first
            self.flush()?;
        }
        self.fd.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.fd.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Replays entries from `from_offset` (defaults to just past the
    /// header) to the current end of the journal.
    pub fn replay_from(&mut self, from_offset: u64) -> Result<Vec<Entry>> {
        self.flush()?;
        let mut out = Vec::new();
        let mut offset = from_offset;
        let end = self.size;
        while offset < end {
            let (entry, consumed) = self.read_entry_at(offset)?;
            offset += consumed;
            out.push(entry);
        }
        Ok(out)
    }

    fn read_entry_at(&mut self, offset: u64) -> Result<(Entry, u64)> {
        let sync = self.pread(offset, 1)?[0];
        if sync != SYNC {
            return Err(Error::BadSync(sync));
        }
        let mut cursor = offset + 1;
        let (ts_us, n) = self.read_varint_i64(cursor)?;
        cursor += n;
        let (artist_id, n) = self.read_varint_u64(cursor)?;
        cursor += n;
        let (session_id, n) = self.read_varint_u64(cursor)?;
        cursor += n;
        let (tracer, n) = self.read_varint_u64(cursor)?;
        cursor += n;
        let (mim_len, n) = self.read_varint_u64(cursor)?;
        cursor += n;
        let mim = self.pread(cursor, mim_len as usize)?;
        cursor += mim_len;
        Ok((
            Entry {
                ts_us,
                artist_id,
                session_id,
                tracer,
                mim,
            },
            cursor - offset,
        ))
    }

    // Varints have unknown length ahead of time; read byte-by-byte through pread.
    fn read_varint_u64(&mut self, offset: u64) -> Result<(u64, u64)> {
        let mut buf = Vec::new();
        let mut cursor = offset;
        loop {
            let byte = self.pread(cursor, 1)?[0];
            buf.push(byte);
            cursor += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let value = wire::leb128::read_u64(buf.as_slice())?;
        Ok((value, buf.len() as u64))
    }

    fn read_varint_i64(&mut self, offset: u64) -> Result<(i64, u64)> {
        let mut buf = Vec::new();
        let mut cursor = offset;
        loop {
            let byte = self.pread(cursor, 1)?[0];
            buf.push(byte);
            cursor += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let value = wire::leb128::read_i64(buf.as_slice())?;
        Ok((value, buf.len() as u64))
    }
}

fn random_insignia() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_is_visible_before_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j.dojo");
        let mut j = Journal::create(&path).unwrap();
        let off = j.append(1, 1, 1, 1, b"hello").unwrap();
        assert_eq!(j.size(), off + 1 + 6 + 4);
        let read = j.pread(off, 1).unwrap();
        assert_eq!(read[0], SYNC);
    }

    #[test]
    fn roundtrip_through_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j.dojo");
        let mut j = Journal::create(&path).unwrap();
        j.append(1, 1, 1, 1, b"abc").unwrap();
        j.append(2, 1, 1, 2, b"defg").unwrap();
        let entries = j.replay_from(HEADER_SIZE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mim, b"abc");
        assert_eq!(entries[1].tracer, 2);
    }

    #[test]
    fn reopen_after_flush_replays_same_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("j.dojo");
        {
            let mut j = Journal::create(&path).unwrap();
            j.append(1, 1, 1, 1, b"abc").unwrap();
            j.flush().unwrap();
        }
        let mut j = Journal::try_from(&path).unwrap();
        let entries = j.replay_from(HEADER_SIZE).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mim, b"abc");
    }
}
