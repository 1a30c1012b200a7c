use thiserror::Error;

/// Any malformed message is reported and the snapshot is left unchanged
/// (spec.md §4.3 failure semantics): [`crate::apply`] never mutates its
/// input in place, so a rejected message simply never produces a
/// replacement snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unexpected end of message")]
    UnexpectedEof,
    #[error("unknown command {0:?}")]
    UnknownCommand(char),
    #[error("expected a number")]
    ExpectedNumber,
    #[error("expected ':'")]
    ExpectedColon,
    #[error("unterminated insert payload")]
    UnterminatedInsert,
    #[error("invalid utf-8 in insert payload")]
    InvalidUtf8,
    #[error("invalid splash4 color")]
    InvalidSplash4,
    #[error("unknown motion {0:?}")]
    UnknownMotion(char),
    #[error("no such book {0}")]
    NoSuchBook(u64),
    #[error("book {0} already exists")]
    BookExists(u64),
    #[error("no such document ({0}, {1})")]
    NoSuchDocument(u64, u64),
    #[error("document ({0}, {1}) already exists")]
    DocumentExists(u64, u64),
    #[error("no such mim-state for this session")]
    NoSuchMimState,
    #[error("no such caret with tag {0}")]
    NoSuchCaret(u32),
    #[error("unknown fundament {0:?}")]
    UnknownFundament(String),
    #[error("unknown ex command {0:?}")]
    UnknownExCommand(String),
    #[error("malformed ex command: {0}")]
    MalformedEx(String),
    #[error("trailing bytes after message")]
    TrailingBytes,
}
