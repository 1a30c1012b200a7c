//! Host role: the journal of record plus the present snapshot derived
//! from replaying it (spec.md §4.5).

use crate::config::Config;
use crate::ringbuf::SpscRing;
use crate::Error;
use journal::Journal;
use model::Snapshot;
use std::fs::File;
use std::sync::Arc;

/// One record waiting in a peer's command buffer, already parsed off
/// the wire or the local ring.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub artist_id: u64,
    pub session_id: u64,
    pub tracer: u64,
    pub not_before_ts: i64,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct PeerBuffer {
    records: Vec<PendingRecord>,
}

pub struct Host {
    journal: Journal<File>,
    snapshot: Snapshot,
    peers: Vec<(u64, PeerBuffer)>,
    last_push_offset: u64,
    push_threshold: u64,
    local_ring: Option<Arc<SpscRing>>,
}

impl Host {
    /// Creates a brand-new journal at `path`, empty snapshot, nothing
    /// pushed yet.
    pub fn create(path: &std::path::Path, config: &Config) -> Result<Self, Error> {
        let mut journal = Journal::create(path)?;
        journal.set_sync_on_append(config.sync_on_append);
        Ok(Self {
            journal,
            snapshot: Snapshot::new(),
            peers: Vec::new(),
            last_push_offset: 0,
            push_threshold: config.push_threshold,
            local_ring: None,
        })
    }

    /// Opens an existing journal and replays it in full (no snapshot
    /// cache consulted here; that's the caller's job before calling
    /// this, by seeding `snapshot`/`last_push_offset` via
    /// [`Self::resume_from`]).
    pub fn open(path: &std::path::Path, config: &Config) -> Result<Self, Error> {
        let mut journal = Journal::try_from(path)?;
        journal.set_sync_on_append(config.sync_on_append);
        let entries = journal.replay_from(journal::HEADER_SIZE)?;
        let mut snapshot = Snapshot::new();
        for entry in &entries {
            snapshot = mim::apply(
                &snapshot,
                entry.artist_id,
                entry.session_id,
                entry.ts_us,
                &entry.mim,
            )?;
        }
        Ok(Self {
            journal,
            snapshot,
            peers: Vec::new(),
            last_push_offset: 0,
            push_threshold: config.push_threshold,
            local_ring: None,
        })
    }

    /// Resumes from a snapshot-cache restore: `snapshot` and
    /// `journal_offset` come from [`snapshotcache::SnapshotCache::restore`],
    /// and only the journal tail past that offset is replayed.
    pub fn resume_from(
        path: &std::path::Path,
        config: &Config,
        snapshot: Snapshot,
        journal_offset: u64,
    ) -> Result<Self, Error> {
        let mut journal = Journal::try_from(path)?;
        journal.set_sync_on_append(config.sync_on_append);
        let entries = journal.replay_from(journal_offset)?;
        let mut snapshot = snapshot;
        for entry in &entries {
            snapshot = mim::apply(
                &snapshot,
                entry.artist_id,
                entry.session_id,
                entry.ts_us,
                &entry.mim,
            )?;
        }
        Ok(Self {
            journal,
            snapshot,
            peers: Vec::new(),
            last_push_offset: journal_offset,
            push_threshold: config.push_threshold,
            local_ring: None,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn journal(&mut self) -> &mut Journal<File> {
        &mut self.journal
    }

    pub fn attach_local_ring(&mut self, ring: Arc<SpscRing>) {
        self.local_ring = Some(ring);
    }

    fn peer_buffer(&mut self, artist_id: u64) -> &mut PeerBuffer {
        if let Some(idx) = self.peers.iter().position(|(id, _)| *id == artist_id) {
            return &mut self.peers[idx].1;
        }
        self.peers.push((artist_id, PeerBuffer::default()));
        &mut self.peers.last_mut().unwrap().1
    }

    /// Queues a record received from the wire or drained from the
    /// local ring buffer; does not commit it yet.
    pub fn enqueue(&mut self, record: PendingRecord) {
        self.peer_buffer(record.artist_id).records.push(record);
    }

    /// Drains whatever's resident in the local peer→host ring, parsing
    /// `wireproto::PeerToHost::Mim` frames out of it (spec.md §4.5 step 2).
    /// `artist_id` identifies which peer owns the ring (single local peer
    /// per host in this implementation).
    fn drain_local_ring(&mut self, artist_id: u64) -> Result<(), Error> {
        let Some(ring) = self.local_ring.clone() else {
            return Ok(());
        };
        loop {
            let header = ring.peek(crate::wireproto::LEN_PREFIX_SIZE);
            if header.len() < crate::wireproto::LEN_PREFIX_SIZE {
                return Ok(());
            }
            let frame_len = u32::from_le_bytes(header.as_slice().try_into().unwrap()) as usize;
            let total = crate::wireproto::LEN_PREFIX_SIZE + frame_len;
            let framed = ring.peek(total);
            if framed.len() < total {
                return Ok(());
            }
            let body = &framed[crate::wireproto::LEN_PREFIX_SIZE..];
            let msg = crate::wireproto::PeerToHost::read_from(body)?;
            ring.advance(total);
            if let crate::wireproto::PeerToHost::Mim {
                session_id,
                tracer,
                payload,
            } = msg
            {
                self.enqueue(PendingRecord {
                    artist_id,
                    session_id,
                    tracer,
                    not_before_ts: 0,
                    payload,
                });
            }
        }
    }

    /// Runs one host tick (spec.md §4.5): drains the local ring if
    /// attached, commits every released record in each peer's buffer,
    /// pushes the snapshot cache past threshold, and returns whether any
    /// work was done.
    pub fn tick(
        &mut self,
        now_us: i64,
        local_peer_artist_id: Option<u64>,
        snapshot_cache: Option<&mut snapshotcache::SnapshotCache>,
    ) -> Result<bool, Error> {
        let mut did_work = false;

        if let Some(artist_id) = local_peer_artist_id {
            self.drain_local_ring(artist_id)?;
        }

        for (_, buffer) in self.peers.iter_mut() {
            let mut released = 0;
            for record in buffer.records.iter() {
                if record.not_before_ts > now_us {
                    break;
                }
                released += 1;
            }
            if released == 0 {
                continue;
            }
            let batch: Vec<PendingRecord> = buffer.records.drain(..released).collect();
            for record in batch {
                self.snapshot = mim::apply(
                    &self.snapshot,
                    record.artist_id,
                    record.session_id,
                    now_us,
                    &record.payload,
                )?;
                self.journal.append(
                    now_us,
                    record.artist_id,
                    record.session_id,
                    record.tracer,
                    &record.payload,
                )?;
                did_work = true;
            }
        }

        if did_work {
            self.journal.flush()?;
            if let Some(cache) = snapshot_cache {
                if self.journal.size() - self.last_push_offset > self.push_threshold {
                    cache.push(&mut self.snapshot, self.journal.size(), now_us)?;
                    self.last_push_offset = self.journal.size();
                }
            }
        }

        Ok(did_work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bootstrap_payload() -> Vec<Vec<u8>> {
        vec![
            b"21:newbook 1 mie-urlyd -".to_vec(),
            b"19:newdoc 1 50 art.mie".to_vec(),
            b"11:setdoc 1 50".to_vec(),
        ]
    }

    #[test]
    fn tick_commits_released_records_in_order() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("journal.dojo");
        let config = Config::new(dir.path().to_path_buf());
        let mut host = Host::create(&journal_path, &config).unwrap();

        let mut tracer = 0;
        for payload in bootstrap_payload() {
            host.enqueue(PendingRecord {
                artist_id: 1,
                session_id: 1,
                tracer,
                not_before_ts: 0,
                payload,
            });
            tracer += 1;
        }
        host.enqueue(PendingRecord {
            artist_id: 1,
            session_id: 1,
            tracer,
            not_before_ts: 1_000_000,
            payload: b"0,1i:z".to_vec(),
        });

        let did_work = host.tick(0, None, None).unwrap();
        assert!(did_work);
        assert_eq!(host.snapshot().documents.len(), 1);

        let still_future = host.tick(0, None, None).unwrap();
        assert!(!still_future);

        let did_work_later = host.tick(2_000_000, None, None).unwrap();
        assert!(did_work_later);
        let text: String = host
            .snapshot()
            .document(1, 50)
            .unwrap()
            .source_chars()
            .map(|c| c.ch)
            .collect();
        assert_eq!(text, "z");
    }

    #[test]
    fn reopen_replays_committed_journal() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("journal.dojo");
        let config = Config::new(dir.path().to_path_buf());
        {
            let mut host = Host::create(&journal_path, &config).unwrap();
            let mut tracer = 0;
            for payload in bootstrap_payload() {
                host.enqueue(PendingRecord {
                    artist_id: 1,
                    session_id: 1,
                    tracer,
                    not_before_ts: 0,
                    payload,
                });
                tracer += 1;
            }
            host.tick(0, None, None).unwrap();
        }
        let reopened = Host::open(&journal_path, &config).unwrap();
        assert_eq!(reopened.snapshot().documents.len(), 1);
    }

    /// spec.md §8 property 1: applying a sequence of mim messages
    /// in-memory matches appending them to the journal and replaying
    /// the journal from scratch.
    #[test]
    fn journal_replay_matches_direct_application() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("journal.dojo");
        let config = Config::new(dir.path().to_path_buf());
        let mut host = Host::create(&journal_path, &config).unwrap();

        let mut direct = Snapshot::new();
        let mut tracer = 0;
        for payload in bootstrap_payload()
            .into_iter()
            .chain(std::iter::once(b"0,1,1c".to_vec()))
            .chain(std::iter::once(b"0,3i:abc".to_vec()))
        {
            direct = mim::apply(&direct, 1, 1, 0, &payload).unwrap();
            host.enqueue(PendingRecord {
                artist_id: 1,
                session_id: 1,
                tracer,
                not_before_ts: 0,
                payload,
            });
            tracer += 1;
        }
        host.tick(0, None, None).unwrap();

        let replayed = Host::open(&journal_path, &config).unwrap();
        assert_eq!(replayed.snapshot(), &direct);
        assert_eq!(host.snapshot(), &direct);
    }

    #[test]
    fn snapshot_cache_restart_matches_full_replay() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("journal.dojo");
        let data_path = dir.path().join("snapshotcache.data");
        let index_path = dir.path().join("snapshotcache.index");
        let mut config = Config::new(dir.path().to_path_buf());
        config.push_threshold = 200;

        let before_snapshot = {
            let mut host = Host::create(&journal_path, &config).unwrap();
            let mut cache = snapshotcache::SnapshotCache::create(&data_path, &index_path, 1).unwrap();
            let mut tracer = 0;
            for payload in bootstrap_payload() {
                host.enqueue(PendingRecord {
                    artist_id: 1,
                    session_id: 1,
                    tracer,
                    not_before_ts: 0,
                    payload,
                });
                tracer += 1;
            }
            for i in 0..500u32 {
                host.enqueue(PendingRecord {
                    artist_id: 1,
                    session_id: 1,
                    tracer,
                    not_before_ts: 0,
                    payload: format!("0,1i:{}", i % 10).into_bytes(),
                });
                tracer += 1;
                host.tick(0, None, Some(&mut cache)).unwrap();
            }
            host.snapshot().clone()
        };

        let mut cache = snapshotcache::SnapshotCache::open(&data_path, &index_path, 1).unwrap();
        let (restored, journal_offset) = cache.restore().unwrap();
        assert!(journal_offset > 0, "push threshold should have been crossed at least once");
        let resumed = Host::resume_from(&journal_path, &config, restored, journal_offset).unwrap();

        assert_eq!(resumed.snapshot(), &before_snapshot);
    }
}
