//! In-memory snapshot data model shared by the mim interpreter, the peer,
//! the host and the snapshot cache.
//!
//! A [`Snapshot`] is the replayed state of a journal up to some offset:
//! an ordered list of [`Book`]s, [`Document`]s and [`MimState`]s, resolved
//! by linear scan over small `Vec`s rather than by pointer or index, so
//! that the same struct can be rebuilt identically from either a fresh
//! journal replay or a snapshot-cache restore (spec invariant: cache
//! restore + tail replay == full replay).

mod book;
mod caret;
mod colorchar;
mod document;
mod location;
mod mimstate;
mod snapshot;
mod splash4;

pub use book::{Book, Fundament};
pub use caret::Caret;
pub use colorchar::ColorChar;
pub use document::{Document, DocChar, EditFlags};
pub use location::Location;
pub use mimstate::MimState;
pub use snapshot::{Snapshot, SnapshotError};
pub use splash4::Splash4;
