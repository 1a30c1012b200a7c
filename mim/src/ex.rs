//! The `:`-prefixed ex sub-language: `newbook`, `newdoc`, `setdoc`.

use crate::Error;
use model::{Book, Document, Fundament, Snapshot};

pub fn run(snapshot: &mut Snapshot, artist_id: u64, session_id: u64, text: &str) -> Result<(), Error> {
    let mut words = text.split_whitespace();
    let command = words.next().unwrap_or("");
    match command {
        "newbook" => {
            let book_id = parse_u64(&mut words)?;
            let fundament_word = words.next().ok_or_else(|| {
                Error::MalformedEx("newbook requires a fundament".into())
            })?;
            let _template = words.next();
            let fundament = parse_fundament(fundament_word)?;
            if snapshot.book(book_id).is_some() {
                return Err(Error::BookExists(book_id));
            }
            snapshot.books.push(Book::new(book_id, fundament));
            Ok(())
        }
        "newdoc" => {
            let book_id = parse_u64(&mut words)?;
            let doc_id = parse_u64(&mut words)?;
            let name = words
                .next()
                .ok_or_else(|| Error::MalformedEx("newdoc requires a name".into()))?;
            if snapshot.book(book_id).is_none() {
                return Err(Error::NoSuchBook(book_id));
            }
            if snapshot.document(book_id, doc_id).is_some() {
                return Err(Error::DocumentExists(book_id, doc_id));
            }
            snapshot
                .documents
                .push(Document::new(book_id, doc_id, name.to_string()));
            Ok(())
        }
        "setdoc" => {
            let book_id = parse_u64(&mut words)?;
            let doc_id = parse_u64(&mut words)?;
            if snapshot.document(book_id, doc_id).is_none() {
                return Err(Error::NoSuchDocument(book_id, doc_id));
            }
            let state = snapshot.ensure_mim_state(artist_id, session_id, book_id, doc_id);
            state.book_id = book_id;
            state.doc_id = doc_id;
            Ok(())
        }
        other => Err(Error::UnknownExCommand(other.to_string())),
    }
}

fn parse_u64<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<u64, Error> {
    words
        .next()
        .ok_or_else(|| Error::MalformedEx("missing argument".into()))?
        .parse()
        .map_err(|_| Error::MalformedEx("expected an integer".into()))
}

fn parse_fundament(word: &str) -> Result<Fundament, Error> {
    match word {
        "mie-urlyd" => Ok(Fundament::MieUrlyd),
        other => other
            .parse::<u32>()
            .map(Fundament::Reserved)
            .map_err(|_| Error::UnknownFundament(other.to_string())),
    }
}
