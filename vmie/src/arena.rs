//! Scratch arena: a bump allocator with a fixed capacity (spec.md §9).
//! The most recent allocation can be grown or shrunk in place; any
//! other growth copies to a fresh tail region, leaking the old bytes
//! until [`Arena::reset`]. No longjmp-style escape: out-of-memory is a
//! plain [`Error::OutOfMemory`] the caller handles with `?`.

use crate::Error;

/// A handle into an [`Arena`]'s backing buffer. Only valid for the
/// arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaHandle {
    offset: usize,
    size: usize,
}

pub struct Arena {
    buf: Box<[u8]>,
    len: usize,
    last: Option<ArenaHandle>,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            last: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn allocated(&self) -> usize {
        self.len
    }

    /// Bumps the arena by `size` bytes, zero-initialized.
    pub fn alloc(&mut self, size: usize) -> Result<ArenaHandle, Error> {
        let available = self.buf.len() - self.len;
        if size > available {
            return Err(Error::OutOfMemory {
                requested: size,
                available,
            });
        }
        let handle = ArenaHandle {
            offset: self.len,
            size,
        };
        self.len += size;
        self.last = Some(handle);
        Ok(handle)
    }

    /// Grows `handle` to `new_size`. In place if `handle` is the most
    /// recent allocation and there's room; otherwise allocates fresh
    /// and copies, leaving the old bytes stranded.
    pub fn grow(&mut self, handle: ArenaHandle, new_size: usize) -> Result<ArenaHandle, Error> {
        if new_size <= handle.size {
            return Ok(handle);
        }
        if Some(handle) == self.last {
            let extra = new_size - handle.size;
            let available = self.buf.len() - self.len;
            if extra > available {
                return Err(Error::OutOfMemory {
                    requested: extra,
                    available,
                });
            }
            self.len += extra;
            let grown = ArenaHandle {
                offset: handle.offset,
                size: new_size,
            };
            self.last = Some(grown);
            return Ok(grown);
        }
        let fresh = self.alloc(new_size)?;
        let (src_start, src_end) = (handle.offset, handle.offset + handle.size);
        let (dst_start, dst_end) = (fresh.offset, fresh.offset + handle.size);
        self.buf.copy_within(src_start..src_end, dst_start);
        self.buf[dst_end..fresh.offset + new_size].fill(0);
        Ok(fresh)
    }

    /// Shrinks `handle` to `new_size`. Only reclaims bump space when
    /// `handle` is the most recent allocation.
    pub fn shrink(&mut self, handle: ArenaHandle, new_size: usize) -> ArenaHandle {
        assert!(new_size <= handle.size);
        let shrunk = ArenaHandle {
            offset: handle.offset,
            size: new_size,
        };
        if Some(handle) == self.last {
            self.len -= handle.size - new_size;
            self.last = Some(shrunk);
        }
        shrunk
    }

    pub fn bytes(&self, handle: ArenaHandle) -> &[u8] {
        &self.buf[handle.offset..handle.offset + handle.size]
    }

    pub fn bytes_mut(&mut self, handle: ArenaHandle) -> &mut [u8] {
        &mut self.buf[handle.offset..handle.offset + handle.size]
    }

    /// Rewinds the whole arena. Any outstanding handles become invalid;
    /// callers are expected to have wrapped their compile/run cycle in
    /// a begin/end scope that ends at the same point it calls this.
    pub fn reset(&mut self) {
        self.len = 0;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_write() {
        let mut arena = Arena::new(64);
        let h = arena.alloc(4).unwrap();
        arena.bytes_mut(h).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(arena.bytes(h), &[1, 2, 3, 4]);
    }

    #[test]
    fn grow_in_place_when_most_recent() {
        let mut arena = Arena::new(64);
        let h = arena.alloc(4).unwrap();
        arena.bytes_mut(h).copy_from_slice(&[1, 2, 3, 4]);
        let grown = arena.grow(h, 8).unwrap();
        assert_eq!(&arena.bytes(grown)[..4], &[1, 2, 3, 4]);
        assert_eq!(arena.allocated(), 8);
    }

    #[test]
    fn grow_not_most_recent_copies_to_tail() {
        let mut arena = Arena::new(64);
        let first = arena.alloc(4).unwrap();
        let _second = arena.alloc(4).unwrap();
        let grown = arena.grow(first, 8).unwrap();
        assert_eq!(arena.allocated(), 16);
        assert_ne!(grown, first);
    }

    #[test]
    fn out_of_memory_is_a_result_not_a_panic() {
        let mut arena = Arena::new(4);
        assert!(arena.alloc(8).is_err());
    }

    #[test]
    fn reset_reclaims_everything() {
        let mut arena = Arena::new(16);
        arena.alloc(16).unwrap();
        assert!(arena.alloc(1).is_err());
        arena.reset();
        assert!(arena.alloc(16).is_ok());
    }
}
