//! Wire protocol crossing the peer/host boundary (spec.md §6). Framing
//! only — transport (WebSocket, TCP, in-process ring) is the caller's
//! concern.

use crate::Error;
use std::io::{Read, Write};
use wire::leb128;

pub const OP_WS0_HELLO: u8 = 0x00;
pub const OP_WS0_MIM: u8 = 0x01;
pub const OP_WS1_HELLO: u8 = 0x10;
pub const OP_WS1_JOURNAL_UPDATE: u8 = 0x11;

/// Size of the length prefix used when framing a message for a
/// self-delimited transport that has no end-of-stream of its own (the
/// peer→host ring buffer, rather than a socket).
pub const LEN_PREFIX_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerToHost {
    Hello { last_journal_offset: u64 },
    Mim { session_id: u64, tracer: u64, payload: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostToPeer {
    Hello { assigned_artist_id: u64 },
    JournalUpdate { entries: Vec<Vec<u8>> },
}

impl PeerToHost {
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), Error> {
        match self {
            PeerToHost::Hello { last_journal_offset } => {
                w.write_all(&[OP_WS0_HELLO])?;
                leb128::write_u64(&mut w, *last_journal_offset)?;
            }
            PeerToHost::Mim {
                session_id,
                tracer,
                payload,
            } => {
                w.write_all(&[OP_WS0_MIM])?;
                leb128::write_u64(&mut w, *session_id)?;
                leb128::write_u64(&mut w, *tracer)?;
                w.write_all(payload)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, Error> {
        let mut op = [0u8; 1];
        r.read_exact(&mut op)?;
        match op[0] {
            OP_WS0_HELLO => Ok(PeerToHost::Hello {
                last_journal_offset: leb128::read_u64(&mut r)?,
            }),
            OP_WS0_MIM => {
                let session_id = leb128::read_u64(&mut r)?;
                let tracer = leb128::read_u64(&mut r)?;
                let mut payload = Vec::new();
                r.read_to_end(&mut payload)?;
                Ok(PeerToHost::Mim {
                    session_id,
                    tracer,
                    payload,
                })
            }
            other => Err(Error::UnknownOpcode(other)),
        }
    }

    /// Encodes with a little-endian `u32` length prefix, for writing
    /// into the peer→host ring buffer (spec.md §4.5/§5: the ring carries
    /// complete, self-delimited records).
    pub fn encode_framed(&self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        self.write_to(&mut body)?;
        let mut framed = Vec::with_capacity(LEN_PREFIX_SIZE + body.len());
        framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
        framed.extend_from_slice(&body);
        Ok(framed)
    }
}

impl HostToPeer {
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), Error> {
        match self {
            HostToPeer::Hello { assigned_artist_id } => {
                w.write_all(&[OP_WS1_HELLO])?;
                leb128::write_u64(&mut w, *assigned_artist_id)?;
            }
            HostToPeer::JournalUpdate { entries } => {
                w.write_all(&[OP_WS1_JOURNAL_UPDATE])?;
                leb128::write_u64(&mut w, entries.len() as u64)?;
                for entry in entries {
                    leb128::write_u64(&mut w, entry.len() as u64)?;
                    w.write_all(entry)?;
                }
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, Error> {
        let mut op = [0u8; 1];
        r.read_exact(&mut op)?;
        match op[0] {
            OP_WS1_HELLO => Ok(HostToPeer::Hello {
                assigned_artist_id: leb128::read_u64(&mut r)?,
            }),
            OP_WS1_JOURNAL_UPDATE => {
                let count = leb128::read_u64(&mut r)?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let len = leb128::read_u64(&mut r)? as usize;
                    let mut entry = vec![0u8; len];
                    r.read_exact(&mut entry)?;
                    entries.push(entry);
                }
                Ok(HostToPeer::JournalUpdate { entries })
            }
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrips() {
        let msg = PeerToHost::Hello {
            last_journal_offset: 12345,
        };
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(PeerToHost::read_from(buf.as_slice()).unwrap(), msg);
    }

    #[test]
    fn journal_update_roundtrips() {
        let msg = HostToPeer::JournalUpdate {
            entries: vec![b"entry-one".to_vec(), b"entry-two".to_vec()],
        };
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(HostToPeer::read_from(buf.as_slice()).unwrap(), msg);
    }

    #[test]
    fn mim_framed_roundtrips_with_length_prefix() {
        let msg = PeerToHost::Mim {
            session_id: 1,
            tracer: 0,
            payload: b"0,1,1c".to_vec(),
        };
        let framed = msg.encode_framed().unwrap();
        let frame_len = u32::from_le_bytes(framed[..LEN_PREFIX_SIZE].try_into().unwrap()) as usize;
        assert_eq!(frame_len, framed.len() - LEN_PREFIX_SIZE);
        let decoded = PeerToHost::read_from(&framed[LEN_PREFIX_SIZE..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn mim_roundtrips() {
        let msg = PeerToHost::Mim {
            session_id: 7,
            tracer: 99,
            payload: b"0,1,1c".to_vec(),
        };
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(PeerToHost::read_from(buf.as_slice()).unwrap(), msg);
    }
}
