//! The mim pushdown automaton: a cursor over the message bytes with modes
//! `COMMAND`, `NUMBER`, `INSERT_STRING`, `INSERT_COLOR_STRING`, `MOTION`
//! and `EX` (spec.md §4.3).
//!
//! [`apply`] never mutates its input: it clones the snapshot, runs the
//! message against the clone, and only the caller commits the result.
//! A rejected message therefore always leaves the original snapshot
//! untouched, matching the "malformed message -> no mutation" rule.

use crate::Error;
use model::{ColorChar, DocChar, EditFlags, Location, MimState, Snapshot, Splash4};

/// Applies one mim message to `snapshot`, returning the resulting
/// snapshot on success. On any error the original `snapshot` is
/// untouched; the caller should simply discard the `Err`.
pub fn apply(
    snapshot: &Snapshot,
    artist_id: u64,
    session_id: u64,
    timestamp_us: i64,
    message: &[u8],
) -> Result<Snapshot, Error> {
    let text = std::str::from_utf8(message).map_err(|_| Error::InvalidUtf8)?;
    let mut interp = Interp {
        snap: snapshot.clone(),
        artist_id,
        session_id,
        timestamp_us,
        chars: text.chars().collect(),
        pos: 0,
    };
    interp.run()?;
    Ok(interp.snap)
}

struct Interp {
    snap: Snapshot,
    artist_id: u64,
    session_id: u64,
    timestamp_us: i64,
    chars: Vec<char>,
    pos: usize,
}

impl Interp {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, want: char) -> Result<(), Error> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(Error::ExpectedColon),
        }
    }

    /// NUMBER mode: a decimal (optionally signed) integer.
    fn read_number(&mut self) -> Result<i64, Error> {
        let start = self.pos;
        if matches!(self.peek(), Some('-')) {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return Err(Error::ExpectedNumber);
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| Error::ExpectedNumber)
    }

    /// Reads a comma-separated list of numbers, one or more, stopping
    /// before the command byte that follows.
    fn read_args(&mut self) -> Result<Vec<i64>, Error> {
        let mut args = vec![self.read_number()?];
        while matches!(self.peek(), Some(',')) {
            self.pos += 1;
            args.push(self.read_number()?);
        }
        Ok(args)
    }

    fn run(&mut self) -> Result<(), Error> {
        while self.peek().is_some() {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), Error> {
        let args = if matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '-') {
            self.read_args()?
        } else {
            Vec::new()
        };
        let command = self.bump().ok_or(Error::UnexpectedEof)?;
        match command {
            'c' => self.do_create_caret(&args),
            'X' => self.do_delete(&args, Side::Left),
            'x' => self.do_delete(&args, Side::Right),
            'i' => self.do_insert_plain(&args),
            'I' => self.do_insert_colored(&args),
            'S' => self.do_move(&args, true),
            'M' => self.do_move(&args, false),
            '~' => self.do_set_color(&args),
            'P' => self.do_paint(&args),
            '!' => self.do_commit_cancel(&args, true),
            '/' => self.do_commit_cancel(&args, false),
            ':' => self.do_ex(&args),
            other => Err(Error::UnknownCommand(other)),
        }
    }

    fn mim_state(&self) -> Result<&MimState, Error> {
        self.snap
            .mim_state(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)
    }

    fn current_doc_identity(&self) -> Result<(u64, u64), Error> {
        let state = self.mim_state()?;
        Ok((state.book_id, state.doc_id))
    }

    fn do_create_caret(&mut self, args: &[i64]) -> Result<(), Error> {
        let [tag, line, column] = arity3(args)?;
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        let loc = Location::new(line as u32, column as u32);
        if let Some(existing) = state.caret_mut(tag as u32) {
            existing.caret_loc = loc;
            existing.anchor_loc = loc;
        } else {
            state.carets.push(model::Caret::new(tag as u32, loc));
        }
        Ok(())
    }

    fn do_set_color(&mut self, args: &[i64]) -> Result<(), Error> {
        let [raw] = arity1(args)?;
        let splash4 = Splash4::from(raw as u16);
        if !splash4.is_valid() {
            return Err(Error::InvalidSplash4);
        }
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        state.splash4 = splash4;
        Ok(())
    }

    fn do_paint(&mut self, args: &[i64]) -> Result<(), Error> {
        let [tag] = arity1(args)?;
        let (book_id, doc_id) = self.current_doc_identity()?;
        let splash4 = self.mim_state()?.splash4;
        let state = self.mim_state()?;
        let caret = state.caret(tag as u32).ok_or(Error::NoSuchCaret(tag as u32))?;
        let (lo, hi) = caret.range();
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let lo_idx = doc.index_for_location(lo).unwrap_or(doc.len());
        let hi_idx = doc.index_for_location(hi).unwrap_or(doc.len());
        let doc = self
            .snap
            .document_mut(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        for i in lo_idx..hi_idx {
            if let Some(c) = doc.get_mut(i) {
                c.color.splash4 = splash4;
            }
        }
        Ok(())
    }

    fn do_move(&mut self, args: &[i64], collapse: bool) -> Result<(), Error> {
        let [tag] = arity1(args)?;
        let (book_id, doc_id) = self.current_doc_identity()?;
        let motion = self.bump().ok_or(Error::UnexpectedEof)?;
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?
            .clone();
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        let caret = state
            .caret_mut(tag as u32)
            .ok_or(Error::NoSuchCaret(tag as u32))?;
        let new_loc = apply_motion(&doc, caret.caret_loc, motion)?;
        caret.caret_loc = new_loc;
        if collapse {
            caret.anchor_loc = new_loc;
        }
        Ok(())
    }

    fn do_insert_plain(&mut self, args: &[i64]) -> Result<(), Error> {
        let [tag, byte_len] = arity2(args)?;
        self.expect(':')?;
        let text = self.read_payload(byte_len as usize)?;
        let splash4 = self.mim_state()?.splash4;
        self.delete_selection(tag as u32)?;
        for ch in text.chars() {
            self.insert_at_caret(tag as u32, ColorChar::new(ch, splash4))?;
        }
        Ok(())
    }

    fn do_insert_colored(&mut self, args: &[i64]) -> Result<(), Error> {
        let [tag, byte_len] = arity2(args)?;
        self.expect(':')?;
        let payload = self.read_payload_chars(byte_len as usize)?;
        self.delete_selection(tag as u32)?;
        let mut iter = payload.into_iter();
        loop {
            let ch = match iter.next() {
                Some(c) => c,
                None => break,
            };
            let raw = iter
                .next()
                .ok_or(Error::UnterminatedInsert)?
                .to_digit(10)
                .ok_or(Error::UnterminatedInsert)? as u16;
            let splash4 = Splash4::from(raw);
            if !splash4.is_valid() {
                return Err(Error::InvalidSplash4);
            }
            self.insert_at_caret(tag as u32, ColorChar::new(ch, splash4))?;
        }
        Ok(())
    }

    /// Reads `byte_len` UTF-8 bytes worth of text starting right after the
    /// current cursor position (spec.md §4.3/§6: the declared length on
    /// `i`/`I`/`:` is a byte count, not a char count, matching every other
    /// length-prefixed field on the wire). The interpreter walks a
    /// `Vec<char>`, so bytes are counted by summing each char's
    /// `len_utf8()` as the cursor advances.
    fn read_payload(&mut self, byte_len: usize) -> Result<String, Error> {
        let end = self.byte_len_end(byte_len)?;
        let s: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        Ok(s)
    }

    fn read_payload_chars(&mut self, byte_len: usize) -> Result<Vec<char>, Error> {
        let end = self.byte_len_end(byte_len)?;
        let s = self.chars[self.pos..end].to_vec();
        self.pos = end;
        Ok(s)
    }

    /// Finds the char index `byte_len` UTF-8 bytes past the cursor,
    /// erroring if the message runs out first or `byte_len` splits a
    /// multi-byte codepoint.
    fn byte_len_end(&self, byte_len: usize) -> Result<usize, Error> {
        let mut remaining = byte_len;
        let mut idx = self.pos;
        while remaining > 0 {
            let ch = *self.chars.get(idx).ok_or(Error::UnterminatedInsert)?;
            let width = ch.len_utf8();
            if width > remaining {
                return Err(Error::UnterminatedInsert);
            }
            remaining -= width;
            idx += 1;
        }
        Ok(idx)
    }

    fn do_ex(&mut self, args: &[i64]) -> Result<(), Error> {
        let text: String = if let Some(&len) = args.first() {
            self.read_payload(len as usize)?
        } else {
            let rest: String = self.chars[self.pos..].iter().collect();
            self.pos = self.chars.len();
            rest
        };
        crate::ex::run(&mut self.snap, self.artist_id, self.session_id, text.trim())
    }

    fn delete_selection(&mut self, tag: u32) -> Result<(), Error> {
        let (book_id, doc_id) = self.current_doc_identity()?;
        let state = self.mim_state()?;
        let caret = state.caret(tag).ok_or(Error::NoSuchCaret(tag))?;
        if caret.caret_loc == caret.anchor_loc {
            return Ok(());
        }
        let (lo, hi) = caret.range();
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let lo_idx = doc.index_for_location(lo).unwrap_or(doc.len());
        let hi_idx = doc.index_for_location(hi).unwrap_or(doc.len());
        for idx in (lo_idx..hi_idx).rev() {
            self.mark_or_remove_deleted(book_id, doc_id, idx)?;
        }
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        let caret = state.caret_mut(tag).ok_or(Error::NoSuchCaret(tag))?;
        caret.caret_loc = lo;
        caret.anchor_loc = lo;
        Ok(())
    }

    fn do_delete(&mut self, args: &[i64], side: Side) -> Result<(), Error> {
        let [tag] = arity1(args)?;
        let (book_id, doc_id) = self.current_doc_identity()?;
        let state = self.mim_state()?;
        let caret = state.caret(tag as u32).ok_or(Error::NoSuchCaret(tag as u32))?;
        if caret.caret_loc != caret.anchor_loc {
            return self.delete_selection(tag as u32);
        }
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let idx = doc.index_for_location(caret.caret_loc).unwrap_or(doc.len());
        let target = match side {
            Side::Left => {
                if idx == 0 {
                    return Ok(());
                }
                idx - 1
            }
            Side::Right => {
                if idx >= doc.len() {
                    return Ok(());
                }
                idx
            }
        };
        self.mark_or_remove_deleted(book_id, doc_id, target)?;
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let new_loc = doc.location_for_index(target.min(doc.len()));
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        let caret = state
            .caret_mut(tag as u32)
            .ok_or(Error::NoSuchCaret(tag as u32))?;
        caret.caret_loc = new_loc;
        caret.anchor_loc = new_loc;
        Ok(())
    }

    /// Characters already flagged `IS_INSERT` are physically removed
    /// (an uncommitted insert simply disappears); everything else is
    /// marked `IS_DELETE` and stays in the buffer, visually struck
    /// through, until a later commit/cancel. Only physical removal
    /// changes the document's length, so only it triggers the
    /// snapshot-wide caret adjustment of spec.md §4.3 — marking
    /// `IS_DELETE` moves nothing but the acting caret (handled by the
    /// caller).
    fn mark_or_remove_deleted(&mut self, book_id: u64, doc_id: u64, index: usize) -> Result<(), Error> {
        let doc = self
            .snap
            .document_mut(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let is_insert = doc
            .chars()
            .get(index)
            .map(|c| c.flags.contains(EditFlags::IS_INSERT))
            .unwrap_or(false);
        if is_insert {
            let loc = doc.location_for_index(index);
            let removed = doc.remove(index);
            let newline = removed.color.ch == '\n';
            self.snap
                .adjust_carets_for_delete(book_id, doc_id, loc, newline);
        } else if let Some(c) = doc.get_mut(index) {
            c.flags.insert(EditFlags::IS_DELETE);
        }
        Ok(())
    }

    fn insert_at_caret(&mut self, tag: u32, color: ColorChar) -> Result<(), Error> {
        let (book_id, doc_id) = self.current_doc_identity()?;
        let state = self.mim_state()?;
        let caret = state.caret(tag).ok_or(Error::NoSuchCaret(tag))?;
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let index = doc.index_for_location(caret.caret_loc).unwrap_or(doc.len());
        let newline = color.ch == '\n';
        let doc = self
            .snap
            .document_mut(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        doc.insert(index, DocChar::new(color, EditFlags::IS_INSERT, self.timestamp_us));
        self.snap
            .adjust_carets_for_insert(book_id, doc_id, caret.caret_loc, newline);
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let new_loc = doc.location_for_index(index + 1);
        let state = self
            .snap
            .mim_state_mut(self.artist_id, self.session_id)
            .ok_or(Error::NoSuchMimState)?;
        let caret = state.caret_mut(tag).ok_or(Error::NoSuchCaret(tag))?;
        caret.caret_loc = new_loc;
        caret.anchor_loc = new_loc;
        Ok(())
    }

    fn do_commit_cancel(&mut self, args: &[i64], commit: bool) -> Result<(), Error> {
        let [tag] = arity1(args)?;
        let (book_id, doc_id) = self.current_doc_identity()?;
        let state = self.mim_state()?;
        let caret = state.caret(tag as u32).ok_or(Error::NoSuchCaret(tag as u32))?;
        let (caret_loc, anchor_loc) = (caret.caret_loc, caret.anchor_loc);
        let doc = self
            .snap
            .document(book_id, doc_id)
            .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
        let mut starts: Vec<usize> = [caret_loc, anchor_loc]
            .into_iter()
            .filter_map(|l| doc.index_for_location(l))
            .collect();
        starts.sort_unstable();
        starts.dedup();
        for start in starts {
            self.resolve_run(book_id, doc_id, start, commit)?;
        }
        Ok(())
    }

    fn resolve_run(&mut self, book_id: u64, doc_id: u64, at: usize, commit: bool) -> Result<(), Error> {
        let doc = match self.snap.document(book_id, doc_id) {
            Some(d) => d,
            None => return Ok(()),
        };
        if doc.is_empty() {
            return Ok(());
        }
        let at = at.min(doc.len() - 1);
        if !qualifies(doc.chars()[at].flags) {
            return Ok(());
        }
        let mut lo = at;
        while lo > 0 && qualifies(doc.chars()[lo - 1].flags) {
            lo -= 1;
        }
        let mut hi = at;
        while hi + 1 < doc.len() && qualifies(doc.chars()[hi + 1].flags) {
            hi += 1;
        }
        for idx in (lo..=hi).rev() {
            let doc = self
                .snap
                .document_mut(book_id, doc_id)
                .ok_or(Error::NoSuchDocument(book_id, doc_id))?;
            let flags = doc.chars()[idx].flags;
            let is_insert = flags.contains(EditFlags::IS_INSERT);
            let physically_remove = (commit && !is_insert) || (!commit && is_insert);
            if physically_remove {
                let loc = doc.location_for_index(idx);
                let removed = doc.remove(idx);
                let newline = removed.color.ch == '\n';
                self.snap
                    .adjust_carets_for_delete(book_id, doc_id, loc, newline);
            } else if let Some(c) = doc.get_mut(idx) {
                c.flags = EditFlags::empty();
            }
        }
        Ok(())
    }
}

fn qualifies(flags: EditFlags) -> bool {
    (flags.contains(EditFlags::IS_INSERT) || flags.contains(EditFlags::IS_DELETE))
        && !flags.contains(EditFlags::IS_DEFER)
}

enum Side {
    Left,
    Right,
}

fn apply_motion(doc: &model::Document, loc: Location, motion: char) -> Result<Location, Error> {
    let line_len = |line: u32| doc.line_len(line);
    match motion {
        'h' => {
            if loc.column > 1 {
                Ok(Location::new(loc.line, loc.column - 1))
            } else if loc.line > 1 {
                Ok(Location::new(loc.line - 1, line_len(loc.line - 1) + 1))
            } else {
                Ok(loc)
            }
        }
        'l' => {
            if loc.column <= line_len(loc.line) {
                Ok(Location::new(loc.line, loc.column + 1))
            } else if loc.line < doc.line_count() {
                Ok(Location::new(loc.line + 1, 1))
            } else {
                Ok(loc)
            }
        }
        'k' => {
            if loc.line > 1 {
                Ok(Location::new(loc.line - 1, loc.column).constrain_to(doc.line_count(), line_len))
            } else {
                Ok(loc)
            }
        }
        'j' => {
            if loc.line < doc.line_count() {
                Ok(Location::new(loc.line + 1, loc.column).constrain_to(doc.line_count(), line_len))
            } else {
                Ok(loc)
            }
        }
        other => Err(Error::UnknownMotion(other)),
    }
}

fn arity1(args: &[i64]) -> Result<[i64; 1], Error> {
    <[i64; 1]>::try_from(args).map_err(|_| Error::ExpectedNumber)
}

fn arity2(args: &[i64]) -> Result<[i64; 2], Error> {
    <[i64; 2]>::try_from(args).map_err(|_| Error::ExpectedNumber)
}

fn arity3(args: &[i64]) -> Result<[i64; 3], Error> {
    <[i64; 3]>::try_from(args).map_err(|_| Error::ExpectedNumber)
}
