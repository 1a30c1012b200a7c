//! The mim edit-command interpreter: applies one byte-stream message to
//! a [`model::Snapshot`], producing a new snapshot or rejecting the
//! message outright (spec.md §4.3).

mod error;
mod ex;
mod interp;

pub use error::Error;
pub use interp::apply;

#[cfg(test)]
mod tests {
    use super::*;
    use model::{EditFlags, Snapshot};

    fn fresh_book_and_doc(snap: &Snapshot) -> Snapshot {
        apply(snap, 1, 1, 0, b"21:newbook 1 mie-urlyd -").unwrap()
    }

    #[test]
    fn end_to_end_single_document() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let snap = apply(&snap, 1, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
        let snap = apply(&snap, 1, 1, 0, b"11:setdoc 1 50").unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,1,1c".as_bytes()).unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,3i:abc".as_bytes()).unwrap();

        assert_eq!(snap.books.len(), 1);
        let doc = snap.document(1, 50).unwrap();
        let text: String = doc.source_chars().map(|c| c.ch).collect();
        assert_eq!(text, "abc");
        let state = snap.mim_state(1, 1).unwrap();
        let caret = state.caret(0).unwrap();
        assert_eq!(caret.caret_loc, model::Location::new(1, 4));
    }

    #[test]
    fn insert_length_is_counted_in_utf8_bytes() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let snap = apply(&snap, 1, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
        let snap = apply(&snap, 1, 1, 0, b"11:setdoc 1 50").unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,1,1c".as_bytes()).unwrap();
        // "héllo" is 6 UTF-8 bytes but only 5 chars; a char-counted
        // length would try to read past the end of the message.
        let snap = apply(&snap, 1, 1, 0, "0,6i:héllo".as_bytes()).unwrap();

        let doc = snap.document(1, 50).unwrap();
        let text: String = doc.source_chars().map(|c| c.ch).collect();
        assert_eq!(text, "héllo");
    }

    #[test]
    fn caret_survives_newline_insertion() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let snap = apply(&snap, 1, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
        let snap = apply(&snap, 1, 1, 0, b"11:setdoc 1 50").unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,1,1c".as_bytes()).unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,3i:abc".as_bytes()).unwrap();
        let snap = apply(&snap, 1, 1, 0, "0Mh0Mh".as_bytes()).unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,1i:\n".as_bytes()).unwrap();

        let doc = snap.document(1, 50).unwrap();
        let text: String = doc.source_chars().map(|c| c.ch).collect();
        assert_eq!(text, "a\nbc");
        let state = snap.mim_state(1, 1).unwrap();
        let caret = state.caret(0).unwrap();
        assert_eq!(caret.caret_loc, model::Location::new(2, 1));
    }

    #[test]
    fn commit_clears_insert_flags() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let snap = apply(&snap, 1, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
        let snap = apply(&snap, 1, 1, 0, b"11:setdoc 1 50").unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,1,1c".as_bytes()).unwrap();
        let snap = apply(&snap, 1, 1, 0, "0,3i:xxx".as_bytes()).unwrap();
        let doc = snap.document(1, 50).unwrap();
        assert!(doc.chars().iter().all(|c| c.flags.contains(EditFlags::IS_INSERT)));

        let snap = apply(&snap, 1, 1, 0, "0!".as_bytes()).unwrap();
        let doc = snap.document(1, 50).unwrap();
        assert!(doc.chars().iter().all(|c| c.flags == EditFlags::empty()));

        let snap_twice = apply(&snap, 1, 1, 0, "0!".as_bytes()).unwrap();
        assert_eq!(snap_twice.document(1, 50), snap.document(1, 50));
    }

    #[test]
    fn unknown_command_is_rejected_without_mutation() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let err = apply(&snap, 1, 1, 0, b"0,1q").unwrap_err();
        assert_eq!(err, Error::UnknownCommand('q'));
    }

    #[test]
    fn malformed_splash4_is_rejected() {
        let snap = Snapshot::new();
        let snap = fresh_book_and_doc(&snap);
        let err = apply(&snap, 1, 1, 0, b"65535~").unwrap_err();
        assert_eq!(err, Error::InvalidSplash4);
    }

    /// spec.md §8 property 3: whatever sequence of inserts/deletes runs
    /// against a document, every caret's location stays within bounds
    /// (column >= 1, column <= line_length+1).
    #[test]
    fn carets_stay_in_bounds_under_random_edits() {
        use quickcheck::{QuickCheck, TestResult};

        fn prop(ops: Vec<u8>) -> TestResult {
            let snap = Snapshot::new();
            let mut snap = apply(&snap, 1, 1, 0, b"21:newbook 1 mie-urlyd -").unwrap();
            snap = apply(&snap, 1, 1, 0, b"19:newdoc 1 50 art.mie").unwrap();
            snap = apply(&snap, 1, 1, 0, b"11:setdoc 1 50").unwrap();
            snap = apply(&snap, 1, 1, 0, b"0,1,1c").unwrap();

            for (i, op) in ops.iter().enumerate().take(64) {
                let message: &[u8] = match op % 5 {
                    0 => b"0,1i:a",
                    1 => b"0,1i:\n",
                    2 => b"0X",
                    3 => b"0x",
                    _ => b"0Ml",
                };
                if let Ok(next) = apply(&snap, 1, 1, i as i64, message) {
                    snap = next;
                }
            }

            let state = snap.mim_state(1, 1).unwrap();
            let doc = snap.document(1, 50).unwrap();
            for caret in &state.carets {
                for loc in [caret.caret_loc, caret.anchor_loc] {
                    if loc.column < 1
                        || loc.line < 1
                        || loc.line > doc.line_count()
                        || loc.column > doc.line_len(loc.line) + 1
                    {
                        return TestResult::failed();
                    }
                }
            }
            TestResult::passed()
        }

        QuickCheck::new()
            .tests(200)
            .quickcheck(prop as fn(Vec<u8>) -> TestResult);
    }
}
