use crate::{Caret, Splash4};

/// One editor session's current document pin, paint color and carets.
/// Identity is `(artist_id, session_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MimState {
    pub artist_id: u64,
    pub session_id: u64,
    pub book_id: u64,
    pub doc_id: u64,
    pub splash4: Splash4,
    pub carets: Vec<Caret>,
    pub snapshotcache_offset: u64,
}

impl MimState {
    pub fn new(artist_id: u64, session_id: u64, book_id: u64, doc_id: u64) -> Self {
        Self {
            artist_id,
            session_id,
            book_id,
            doc_id,
            splash4: Splash4::default(),
            carets: Vec::new(),
            snapshotcache_offset: 0,
        }
    }

    pub fn identity(&self) -> (u64, u64) {
        (self.artist_id, self.session_id)
    }

    pub fn caret_mut(&mut self, tag: u32) -> Option<&mut Caret> {
        self.carets.iter_mut().find(|c| c.tag == tag)
    }

    pub fn caret(&self, tag: u32) -> Option<&Caret> {
        self.carets.iter().find(|c| c.tag == tag)
    }
}
