mod config;
mod error;
mod host;
mod io_port;
mod peer;
mod ringbuf;
mod wireproto;

pub use config::{Config, ConfigRegistry};
pub use error::Error;
pub use host::{Host, PendingRecord};
pub use io_port::IoPort;
pub use peer::{Peer, UnackedEntry};
pub use ringbuf::SpscRing;
pub use wireproto::{HostToPeer, PeerToHost};
