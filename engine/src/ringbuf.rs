//! Peer→host mim ring buffer: single-producer single-consumer, used only
//! when a peer and the host share one process (spec.md §4.5/§9). Writes
//! are all-or-nothing across the wrap; the consumer reads a contiguous
//! range and then advances the tail.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct SpscRing {
    buf: Box<[u8]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl SpscRing {
    /// `capacity` is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn len(&self) -> usize {
        self.head.load(Ordering::Acquire) - self.tail.load(Ordering::Acquire)
    }

    /// Producer side: writes `record` as one contiguous logical write
    /// (split into at most two `copy_from_slice` calls at the physical
    /// wrap point). Fails if the record doesn't fit in the free space.
    pub fn push(&self, record: &[u8]) -> Result<(), crate::Error> {
        let free = self.capacity() - self.len();
        if record.len() > free {
            return Err(crate::Error::RingBufferFull {
                requested: record.len(),
                available: free,
            });
        }
        let head = self.head.load(Ordering::Relaxed);
        let start = head & self.mask;
        let first = (self.capacity() - start).min(record.len());
        let buf = self.buf.as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(record.as_ptr(), buf.add(start), first);
            if first < record.len() {
                std::ptr::copy_nonoverlapping(
                    record[first..].as_ptr(),
                    buf,
                    record.len() - first,
                );
            }
        }
        self.head.store(head + record.len(), Ordering::Release);
        Ok(())
    }

    /// Consumer side: copies out up to `len` resident bytes starting at
    /// the current tail without advancing it.
    pub fn peek(&self, len: usize) -> Vec<u8> {
        let available = self.len().min(len);
        let tail = self.tail.load(Ordering::Relaxed);
        let start = tail & self.mask;
        let first = (self.capacity() - start).min(available);
        let mut out = Vec::with_capacity(available);
        out.extend_from_slice(&self.buf[start..start + first]);
        if first < available {
            out.extend_from_slice(&self.buf[..available - first]);
        }
        out
    }

    /// Consumer side: frees `len` bytes from the tail after they've been
    /// fully parsed out of [`Self::peek`]'s result.
    pub fn advance(&self, len: usize) {
        let tail = self.tail.load(Ordering::Relaxed);
        self.tail.store(tail + len, Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

unsafe impl Send for SpscRing {}
unsafe impl Sync for SpscRing {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_peek_roundtrip() {
        let ring = SpscRing::new(16);
        ring.push(b"hello").unwrap();
        assert_eq!(ring.peek(5), b"hello");
        ring.advance(5);
        assert!(ring.is_empty());
    }

    #[test]
    fn wraps_around_physical_end() {
        let ring = SpscRing::new(8);
        ring.push(b"123456").unwrap();
        ring.advance(6);
        ring.push(b"abcdef").unwrap();
        assert_eq!(ring.peek(6), b"abcdef");
    }

    #[test]
    fn overfull_write_is_rejected() {
        let ring = SpscRing::new(4);
        assert!(ring.push(b"12345").is_err());
    }
}
