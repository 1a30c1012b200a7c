use crate::{ColorChar, Location};

/// Per-character edit flags. Uncommitted insertions remain in the buffer
/// flagged `IS_INSERT`; pending deletions keep the original character
/// flagged `IS_DELETE`. `FILL` marks a character as having been visited by
/// a commit/cancel pass; `IS_DEFER` bounds a commit/cancel run the way a
/// plain (neither-insert-nor-delete) character does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditFlags(u8);

impl EditFlags {
    pub const IS_INSERT: EditFlags = EditFlags(1 << 0);
    pub const IS_DELETE: EditFlags = EditFlags(1 << 1);
    pub const FLIPPED_INSERT: EditFlags = EditFlags(1 << 2);
    pub const FLIPPED_DELETE: EditFlags = EditFlags(1 << 3);
    pub const FILL: EditFlags = EditFlags(1 << 4);
    pub const IS_DEFER: EditFlags = EditFlags(1 << 5);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// A character neither pending-inserted nor pending-deleted: the kind
    /// that bounds a commit/cancel run.
    pub const fn is_plain(self) -> bool {
        !self.contains(Self::IS_INSERT) && !self.contains(Self::IS_DELETE)
    }
}

/// A colored character plus its pending-edit state and insertion timestamp
/// (microseconds, matching the journal's `ts_us`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocChar {
    pub color: ColorChar,
    pub flags: EditFlags,
    pub timestamp: i64,
}

impl DocChar {
    pub fn new(color: ColorChar, flags: EditFlags, timestamp: i64) -> Self {
        Self {
            color,
            flags,
            timestamp,
        }
    }

    pub fn plain(color: ColorChar, timestamp: i64) -> Self {
        Self::new(color, EditFlags::empty(), timestamp)
    }
}

/// A named sequence of colored characters inside a book. Identity is
/// `(book_id, doc_id)`, both chosen by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub book_id: u64,
    pub doc_id: u64,
    pub name: String,
    chars: Vec<DocChar>,
    pub snapshotcache_offset: u64,
}

impl Document {
    pub fn new(book_id: u64, doc_id: u64, name: String) -> Self {
        Self {
            book_id,
            doc_id,
            name,
            chars: Vec::new(),
            snapshotcache_offset: 0,
        }
    }

    pub fn identity(&self) -> (u64, u64) {
        (self.book_id, self.doc_id)
    }

    pub fn chars(&self) -> &[DocChar] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of lines, counting the implicit line after a trailing
    /// newline (an empty document is one empty line).
    pub fn line_count(&self) -> u32 {
        1 + self.chars.iter().filter(|c| c.color.ch == '\n').count() as u32
    }

    /// Column length of `line` (1-based), not counting the trailing
    /// newline itself.
    pub fn line_len(&self, line: u32) -> u32 {
        let mut cur = 1u32;
        let mut len = 0u32;
        for c in &self.chars {
            if cur == line {
                if c.color.ch == '\n' {
                    break;
                }
                len += 1;
            }
            if c.color.ch == '\n' {
                cur += 1;
                if cur > line {
                    break;
                }
            }
        }
        len
    }

    /// Convert a `Location` to a buffer index. Returns `None` if the
    /// location is out of bounds for the document.
    pub fn index_for_location(&self, loc: Location) -> Option<usize> {
        let mut cur_line = 1u32;
        let mut cur_col = 1u32;
        for (i, c) in self.chars.iter().enumerate() {
            if cur_line == loc.line && cur_col == loc.column {
                return Some(i);
            }
            if c.color.ch == '\n' {
                cur_line += 1;
                cur_col = 1;
            } else {
                cur_col += 1;
            }
        }
        if cur_line == loc.line && cur_col == loc.column {
            return Some(self.chars.len());
        }
        None
    }

    pub fn location_for_index(&self, index: usize) -> Location {
        let mut cur_line = 1u32;
        let mut cur_col = 1u32;
        for c in self.chars.iter().take(index) {
            if c.color.ch == '\n' {
                cur_line += 1;
                cur_col = 1;
            } else {
                cur_col += 1;
            }
        }
        Location::new(cur_line, cur_col)
    }

    pub fn insert(&mut self, index: usize, c: DocChar) {
        self.chars.insert(index, c);
    }

    pub fn remove(&mut self, index: usize) -> DocChar {
        self.chars.remove(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DocChar> {
        self.chars.get_mut(index)
    }

    /// Text as the mie compiler sees it: everything not flagged
    /// `IS_DELETE`, including uncommitted inserts (they read as ordinary
    /// text until cancelled).
    pub fn source_chars(&self) -> impl Iterator<Item = ColorChar> + '_ {
        self.chars
            .iter()
            .filter(|c| !c.flags.contains(EditFlags::IS_DELETE))
            .map(|c| c.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Splash4;

    fn push(doc: &mut Document, s: &str) {
        for ch in s.chars() {
            let idx = doc.len();
            doc.insert(idx, DocChar::plain(ColorChar::new(ch, Splash4::default()), 0));
        }
    }

    #[test]
    fn line_len_and_count() {
        let mut doc = Document::new(1, 1, "a".into());
        push(&mut doc, "ab\ncd");
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line_len(1), 2);
        assert_eq!(doc.line_len(2), 2);
    }

    #[test]
    fn location_index_roundtrip() {
        let mut doc = Document::new(1, 1, "a".into());
        push(&mut doc, "ab\ncd");
        let loc = Location::new(2, 1);
        let idx = doc.index_for_location(loc).unwrap();
        assert_eq!(doc.location_for_index(idx), loc);
    }
}
