//! Packed on-disk representation of a [`Book`], [`Document`] or
//! [`MimState`] for the snapshot-cache data file. Each record starts with
//! the shared `0xFA` sync byte, a one-byte entity tag, then
//! LEB128/UTF-8-framed fields.

use crate::error::Error;
use model::{
    Book, Caret, ColorChar, DocChar, Document, EditFlags, Fundament, Location, MimState, Splash4,
};
use std::io::{Read, Write};
use wire::leb128;

const TAG_BOOK: u8 = 0;
const TAG_DOCUMENT: u8 = 1;
const TAG_MIM_STATE: u8 = 2;

pub enum Entity {
    Book(Book),
    Document(Document),
    MimState(MimState),
}

pub fn write_entity<W: Write>(mut w: W, entity: &Entity) -> Result<(), Error> {
    w.write_all(&[wire::SYNC])?;
    match entity {
        Entity::Book(b) => {
            w.write_all(&[TAG_BOOK])?;
            write_book(&mut w, b)
        }
        Entity::Document(d) => {
            w.write_all(&[TAG_DOCUMENT])?;
            write_document(&mut w, d)
        }
        Entity::MimState(m) => {
            w.write_all(&[TAG_MIM_STATE])?;
            write_mim_state(&mut w, m)
        }
    }
}

pub fn read_entity<R: Read>(mut r: R) -> Result<Entity, Error> {
    let mut sync = [0u8; 1];
    r.read_exact(&mut sync)?;
    if sync[0] != wire::SYNC {
        return Err(Error::BadMagic);
    }
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag)?;
    match tag[0] {
        TAG_BOOK => Ok(Entity::Book(read_book(&mut r)?)),
        TAG_DOCUMENT => Ok(Entity::Document(read_document(&mut r)?)),
        TAG_MIM_STATE => Ok(Entity::MimState(read_mim_state(&mut r)?)),
        other => Err(Error::UnknownEntityTag(other)),
    }
}

fn write_book<W: Write>(mut w: W, b: &Book) -> Result<(), Error> {
    leb128::write_u64(&mut w, b.book_id)?;
    leb128::write_u32(&mut w, b.fundament.to_u32())?;
    leb128::write_u64(&mut w, b.snapshotcache_offset)?;
    Ok(())
}

fn read_book<R: Read>(mut r: R) -> Result<Book, Error> {
    let book_id = leb128::read_u64(&mut r)?;
    let fundament = Fundament::from_u32(leb128::read_u32(&mut r)?);
    let snapshotcache_offset = leb128::read_u64(&mut r)?;
    Ok(Book {
        book_id,
        fundament,
        snapshotcache_offset,
    })
}

fn write_string<W: Write>(mut w: W, s: &str) -> Result<(), Error> {
    leb128::write_u64(&mut w, s.len() as u64)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(mut r: R) -> Result<String, Error> {
    let len = leb128::read_u64(&mut r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::BadMagic)
}

fn write_color_char<W: Write>(mut w: W, c: &ColorChar) -> Result<(), Error> {
    leb128::write_u32(&mut w, c.ch as u32)?;
    wire::fixed::write_u16_le(&mut w, u16::from(c.splash4))?;
    Ok(())
}

fn read_color_char<R: Read>(mut r: R) -> Result<ColorChar, Error> {
    let ch = char::from_u32(leb128::read_u32(&mut r)?).unwrap_or('\u{fffd}');
    let splash4 = Splash4::from(wire::fixed::read_u16_le(&mut r)?);
    Ok(ColorChar::new(ch, splash4))
}

fn write_document<W: Write>(mut w: W, d: &Document) -> Result<(), Error> {
    leb128::write_u64(&mut w, d.book_id)?;
    leb128::write_u64(&mut w, d.doc_id)?;
    write_string(&mut w, &d.name)?;
    leb128::write_u64(&mut w, d.snapshotcache_offset)?;
    leb128::write_u64(&mut w, d.chars().len() as u64)?;
    for c in d.chars() {
        write_color_char(&mut w, &c.color)?;
        w.write_all(&[doc_flags_byte(c.flags)])?;
        leb128::write_i64(&mut w, c.timestamp)?;
    }
    Ok(())
}

fn read_document<R: Read>(mut r: R) -> Result<Document, Error> {
    let book_id = leb128::read_u64(&mut r)?;
    let doc_id = leb128::read_u64(&mut r)?;
    let name = read_string(&mut r)?;
    let snapshotcache_offset = leb128::read_u64(&mut r)?;
    let count = leb128::read_u64(&mut r)? as usize;
    let mut doc = Document::new(book_id, doc_id, name);
    doc.snapshotcache_offset = snapshotcache_offset;
    for i in 0..count {
        let color = read_color_char(&mut r)?;
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        let flags = doc_flags_from_byte(byte[0]);
        let timestamp = leb128::read_i64(&mut r)?;
        doc.insert(i, DocChar::new(color, flags, timestamp));
    }
    Ok(doc)
}

fn doc_flags_byte(flags: EditFlags) -> u8 {
    let mut byte = 0u8;
    if flags.contains(EditFlags::IS_INSERT) {
        byte |= 1 << 0;
    }
    if flags.contains(EditFlags::IS_DELETE) {
        byte |= 1 << 1;
    }
    if flags.contains(EditFlags::FLIPPED_INSERT) {
        byte |= 1 << 2;
    }
    if flags.contains(EditFlags::FLIPPED_DELETE) {
        byte |= 1 << 3;
    }
    if flags.contains(EditFlags::FILL) {
        byte |= 1 << 4;
    }
    if flags.contains(EditFlags::IS_DEFER) {
        byte |= 1 << 5;
    }
    byte
}

fn doc_flags_from_byte(byte: u8) -> EditFlags {
    let mut flags = EditFlags::empty();
    if byte & (1 << 0) != 0 {
        flags.insert(EditFlags::IS_INSERT);
    }
    if byte & (1 << 1) != 0 {
        flags.insert(EditFlags::IS_DELETE);
    }
    if byte & (1 << 2) != 0 {
        flags.insert(EditFlags::FLIPPED_INSERT);
    }
    if byte & (1 << 3) != 0 {
        flags.insert(EditFlags::FLIPPED_DELETE);
    }
    if byte & (1 << 4) != 0 {
        flags.insert(EditFlags::FILL);
    }
    if byte & (1 << 5) != 0 {
        flags.insert(EditFlags::IS_DEFER);
    }
    flags
}

fn write_mim_state<W: Write>(mut w: W, m: &MimState) -> Result<(), Error> {
    leb128::write_u64(&mut w, m.artist_id)?;
    leb128::write_u64(&mut w, m.session_id)?;
    leb128::write_u64(&mut w, m.book_id)?;
    leb128::write_u64(&mut w, m.doc_id)?;
    wire::fixed::write_u16_le(&mut w, u16::from(m.splash4))?;
    leb128::write_u64(&mut w, m.snapshotcache_offset)?;
    leb128::write_u64(&mut w, m.carets.len() as u64)?;
    for c in &m.carets {
        leb128::write_u32(&mut w, c.tag)?;
        leb128::write_u32(&mut w, c.caret_loc.line)?;
        leb128::write_u32(&mut w, c.caret_loc.column)?;
        leb128::write_u32(&mut w, c.anchor_loc.line)?;
        leb128::write_u32(&mut w, c.anchor_loc.column)?;
    }
    Ok(())
}

fn read_mim_state<R: Read>(mut r: R) -> Result<MimState, Error> {
    let artist_id = leb128::read_u64(&mut r)?;
    let session_id = leb128::read_u64(&mut r)?;
    let book_id = leb128::read_u64(&mut r)?;
    let doc_id = leb128::read_u64(&mut r)?;
    let splash4 = Splash4::from(wire::fixed::read_u16_le(&mut r)?);
    let snapshotcache_offset = leb128::read_u64(&mut r)?;
    let count = leb128::read_u64(&mut r)? as usize;
    let mut state = MimState::new(artist_id, session_id, book_id, doc_id);
    state.splash4 = splash4;
    state.snapshotcache_offset = snapshotcache_offset;
    for _ in 0..count {
        let tag = leb128::read_u32(&mut r)?;
        let caret_loc = Location::new(leb128::read_u32(&mut r)?, leb128::read_u32(&mut r)?);
        let anchor_loc = Location::new(leb128::read_u32(&mut r)?, leb128::read_u32(&mut r)?);
        state.carets.push(Caret {
            tag,
            caret_loc,
            anchor_loc,
        });
    }
    Ok(state)
}
