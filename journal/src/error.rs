//! Journal format/IO error
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    Wire(wire::Error),
    BadMagic,
    BadVersion(u64),
    BadSync(u8),
    BufferFull,
    InsigniaMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<wire::Error> for Error {
    fn from(e: wire::Error) -> Self {
        Self::Wire(e)
    }
}
