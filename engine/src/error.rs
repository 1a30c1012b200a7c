use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("journal error: {0}")]
    Journal(#[from] journal::Error),
    #[error("snapshot cache error: {0}")]
    SnapshotCache(#[from] snapshotcache::Error),
    #[error("mim error: {0}")]
    Mim(#[from] mim::Error),
    #[error("wire error: {0}")]
    Wire(#[from] wire::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("tracer disorder: expected > {expected}, got {got}")]
    TracerDisorder { expected: u64, got: u64 },
    #[error("ring buffer write would not be contiguous ({requested} bytes, {available} available)")]
    RingBufferFull { requested: usize, available: usize },
    #[error("unknown wire opcode {0}")]
    UnknownOpcode(u8),
}
