use crate::{Book, Document, Location, MimState};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("book {0} already exists")]
    BookExists(u64),
    #[error("book {0} does not exist")]
    NoSuchBook(u64),
    #[error("document ({0}, {1}) already exists")]
    DocumentExists(u64, u64),
    #[error("document ({0}, {1}) does not exist")]
    NoSuchDocument(u64, u64),
    #[error("mim-state ({0}, {1}) does not exist")]
    NoSuchMimState(u64, u64),
}

/// Replayed state of a journal up to some offset: ordered books,
/// documents and mim-states, resolved by linear scan over small `Vec`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub books: Vec<Book>,
    pub documents: Vec<Document>,
    pub mim_states: Vec<MimState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&self, book_id: u64) -> Option<&Book> {
        self.books.iter().find(|b| b.book_id == book_id)
    }

    pub fn book_mut(&mut self, book_id: u64) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.book_id == book_id)
    }

    pub fn document(&self, book_id: u64, doc_id: u64) -> Option<&Document> {
        self.documents
            .iter()
            .find(|d| d.book_id == book_id && d.doc_id == doc_id)
    }

    pub fn document_mut(&mut self, book_id: u64, doc_id: u64) -> Option<&mut Document> {
        self.documents
            .iter_mut()
            .find(|d| d.book_id == book_id && d.doc_id == doc_id)
    }

    pub fn mim_state(&self, artist_id: u64, session_id: u64) -> Option<&MimState> {
        self.mim_states
            .iter()
            .find(|m| m.artist_id == artist_id && m.session_id == session_id)
    }

    pub fn mim_state_mut(&mut self, artist_id: u64, session_id: u64) -> Option<&mut MimState> {
        self.mim_states
            .iter_mut()
            .find(|m| m.artist_id == artist_id && m.session_id == session_id)
    }

    pub fn ensure_mim_state(
        &mut self,
        artist_id: u64,
        session_id: u64,
        book_id: u64,
        doc_id: u64,
    ) -> &mut MimState {
        if self
            .mim_states
            .iter()
            .any(|m| m.artist_id == artist_id && m.session_id == session_id)
        {
            return self.mim_state_mut(artist_id, session_id).unwrap();
        }
        self.mim_states
            .push(MimState::new(artist_id, session_id, book_id, doc_id));
        self.mim_states.last_mut().unwrap()
    }

    /// Adjusts every caret in every mim-state whose current document is
    /// `(book_id, doc_id)`, for a single character inserted at `at`
    /// (spec.md §4.3). When `newline` is true the inserted character is
    /// `'\n'`.
    pub fn adjust_carets_for_insert(
        &mut self,
        book_id: u64,
        doc_id: u64,
        at: Location,
        newline: bool,
    ) {
        for state in self
            .mim_states
            .iter_mut()
            .filter(|m| m.book_id == book_id && m.doc_id == doc_id)
        {
            for caret in state.carets.iter_mut() {
                caret.caret_loc = adjust_for_insert(caret.caret_loc, at, newline);
                caret.anchor_loc = adjust_for_insert(caret.anchor_loc, at, newline);
            }
        }
    }

    /// Mirror of [`Self::adjust_carets_for_insert`] for a single character
    /// removed at `at` (which was, before removal, on a line with length
    /// `removed_line_len` and `removed_was_newline` tells us whether that
    /// character was itself a newline).
    pub fn adjust_carets_for_delete(
        &mut self,
        book_id: u64,
        doc_id: u64,
        at: Location,
        removed_was_newline: bool,
    ) {
        for state in self
            .mim_states
            .iter_mut()
            .filter(|m| m.book_id == book_id && m.doc_id == doc_id)
        {
            for caret in state.carets.iter_mut() {
                caret.caret_loc = adjust_for_delete(caret.caret_loc, at, removed_was_newline);
                caret.anchor_loc = adjust_for_delete(caret.anchor_loc, at, removed_was_newline);
            }
        }
    }
}

fn adjust_for_insert(loc: Location, at: Location, newline: bool) -> Location {
    if loc.line < at.line || (loc.line == at.line && loc.column <= at.column) {
        return loc;
    }
    if loc.line == at.line {
        if newline {
            Location::new(loc.line + 1, loc.column - (at.column - 1))
        } else {
            Location::new(loc.line, loc.column + 1)
        }
    } else if newline {
        Location::new(loc.line + 1, loc.column)
    } else {
        loc
    }
}

fn adjust_for_delete(loc: Location, at: Location, removed_was_newline: bool) -> Location {
    if loc.line < at.line || (loc.line == at.line && loc.column <= at.column) {
        return loc;
    }
    if removed_was_newline && loc.line == at.line + 1 {
        Location::new(at.line, loc.column + (at.column - 1))
    } else if loc.line == at.line {
        Location::new(loc.line, loc.column - 1)
    } else if removed_was_newline {
        Location::new(loc.line - 1, loc.column)
    } else {
        loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_on_same_line_shifts_right() {
        let loc = Location::new(3, 5);
        let at = Location::new(3, 2);
        assert_eq!(adjust_for_insert(loc, at, false), Location::new(3, 6));
    }

    #[test]
    fn insert_newline_splits_column() {
        let loc = Location::new(3, 5);
        let at = Location::new(3, 2);
        assert_eq!(adjust_for_insert(loc, at, true), Location::new(4, 4));
    }

    #[test]
    fn insert_earlier_line_unaffected() {
        let loc = Location::new(1, 5);
        let at = Location::new(3, 2);
        assert_eq!(adjust_for_insert(loc, at, true), loc);
    }

    #[test]
    fn insert_at_exact_caret_location_leaves_it_untouched() {
        let loc = Location::new(3, 2);
        let at = Location::new(3, 2);
        assert_eq!(adjust_for_insert(loc, at, false), loc);
    }

    #[test]
    fn delete_and_insert_are_mirror() {
        let original = Location::new(3, 5);
        let at = Location::new(3, 2);
        let after_insert = adjust_for_insert(original, at, false);
        let restored = adjust_for_delete(after_insert, at, false);
        assert_eq!(restored, original);
    }
}
