mod error;
mod header;
mod journal;
mod ringbuf;

pub use error::Error;
pub use header::{Header, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use journal::{Entry, Journal, SYNC};
pub use ringbuf::RingBuffer;
