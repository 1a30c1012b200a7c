//! Peer role: local speculative editing rebased onto the host's
//! confirmed journal (spec.md §4.4).

use crate::Error;
use journal::Entry;
use model::Snapshot;
use rand::Rng;

/// One locally-submitted, not-yet-acknowledged mim command.
#[derive(Debug, Clone, PartialEq)]
pub struct UnackedEntry {
    pub session_id: u64,
    pub tracer: u64,
    pub not_before_ts: i64,
    pub payload: Vec<u8>,
}

pub struct Peer {
    pub artist_id: u64,
    /// Last state confirmed by the host.
    pub upstream: Snapshot,
    /// Upstream plus speculative replay of every un-ack'd local command.
    pub fiddle: Snapshot,
    unacked: Vec<UnackedEntry>,
    next_tracer: u64,
}

impl Peer {
    pub fn new(artist_id: u64) -> Self {
        Self {
            artist_id,
            upstream: Snapshot::new(),
            fiddle: Snapshot::new(),
            unacked: Vec::new(),
            next_tracer: 0,
        }
    }

    pub fn unacked(&self) -> &[UnackedEntry] {
        &self.unacked
    }

    /// `peer_begin_mim`/`peer_end_mim` collapsed into one call: the
    /// payload is applied to the fiddle snapshot immediately, assigned
    /// the next monotonic tracer, and queued for transmission to the
    /// host (directly into its ring buffer when peer == host, or onto
    /// the wire otherwise — both are the caller's concern).
    pub fn submit_mim(
        &mut self,
        session_id: u64,
        now_us: i64,
        payload: Vec<u8>,
        jitter: bool,
    ) -> Result<UnackedEntry, Error> {
        self.fiddle = mim::apply(&self.fiddle, self.artist_id, session_id, now_us, &payload)?;
        let tracer = self.next_tracer;
        self.next_tracer += 1;
        let not_before_ts = if jitter {
            now_us + irwin_hall_latency_us()
        } else {
            now_us
        };
        let entry = UnackedEntry {
            session_id,
            tracer,
            not_before_ts,
            payload,
        };
        self.unacked.push(entry.clone());
        Ok(entry)
    }

    /// Applies a broadcast journal segment, in journal order. Entries
    /// for this peer's own `artist_id` prune matching tracers from the
    /// un-ack'd buffer; the fiddle snapshot is then rebuilt as upstream
    /// plus a replay of whatever remains.
    pub fn on_journal_broadcast(&mut self, entries: &[Entry]) -> Result<(), Error> {
        for entry in entries {
            self.upstream = mim::apply(
                &self.upstream,
                entry.artist_id,
                entry.session_id,
                entry.ts_us,
                &entry.mim,
            )?;
            if entry.artist_id == self.artist_id {
                self.unacked
                    .retain(|u| !(u.session_id == entry.session_id && u.tracer <= entry.tracer));
            }
        }
        self.rebuild_fiddle()
    }

    fn rebuild_fiddle(&mut self) -> Result<(), Error> {
        let mut last_tracer = None;
        for unacked in &self.unacked {
            if let Some(last) = last_tracer {
                if unacked.tracer <= last {
                    return Err(Error::TracerDisorder {
                        expected: last + 1,
                        got: unacked.tracer,
                    });
                }
            }
            last_tracer = Some(unacked.tracer);
        }
        let mut fiddle = self.upstream.clone();
        for unacked in &self.unacked {
            fiddle = mim::apply(
                &fiddle,
                self.artist_id,
                unacked.session_id,
                unacked.not_before_ts,
                &unacked.payload,
            )?;
        }
        self.fiddle = fiddle;
        Ok(())
    }
}

/// Approximates a normal distribution via the Irwin–Hall(12) sum: twelve
/// independent uniform(0,1) draws summed and re-centered have variance 1
/// (spec.md §4.4's "artificial latency" knob).
fn irwin_hall_latency_us() -> i64 {
    let mut rng = rand::thread_rng();
    let sum: f64 = (0..12).map(|_| rng.gen::<f64>()).sum();
    ((sum - 6.0) * 1_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap(artist_id: u64) -> Snapshot {
        let snap = Snapshot::new();
        let snap = mim::apply(&snap, artist_id, 1, 0, b"21:newbook 1 mie-urlyd -").unwrap();
        let snap = mim::apply(&snap, artist_id, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
        mim::apply(&snap, artist_id, 1, 0, b"11:setdoc 1 50").unwrap()
    }

    #[test]
    fn rebase_after_partial_ack() {
        let mut peer = Peer::new(1);
        peer.upstream = bootstrap(1);
        peer.fiddle = peer.upstream.clone();

        let e1 = peer.submit_mim(1, 0, b"0,1,1c".to_vec(), false).unwrap();
        let e2 = peer.submit_mim(1, 0, b"0,1i:a".to_vec(), false).unwrap();
        let e3 = peer.submit_mim(1, 0, b"0,1i:b".to_vec(), false).unwrap();
        assert_eq!(peer.unacked().len(), 3);

        let broadcast = vec![
            Entry {
                ts_us: 0,
                artist_id: 1,
                session_id: 1,
                tracer: e1.tracer,
                mim: e1.payload,
            },
            Entry {
                ts_us: 0,
                artist_id: 1,
                session_id: 1,
                tracer: e2.tracer,
                mim: e2.payload,
            },
        ];
        peer.on_journal_broadcast(&broadcast).unwrap();

        assert_eq!(peer.unacked().len(), 1);
        assert_eq!(peer.unacked()[0].tracer, e3.tracer);
        let upstream_text: String = peer
            .upstream
            .document(1, 50)
            .unwrap()
            .source_chars()
            .map(|c| c.ch)
            .collect();
        assert_eq!(upstream_text, "a");
        let fiddle_text: String = peer
            .fiddle
            .document(1, 50)
            .unwrap()
            .source_chars()
            .map(|c| c.ch)
            .collect();
        assert_eq!(fiddle_text, "ab");
    }
}
