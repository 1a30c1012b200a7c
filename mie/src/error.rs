use thiserror::Error;

/// A line:column position in compiler source, 1-indexed on `line` and
/// 0-indexed on `column` to match the tokenizer's own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// A located compiler error (spec.md §4.6: "location-tagged (line:column
/// of the offending token)"). The compiler stops at the first one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at line {line}:{column}")]
pub struct Error {
    pub message: String,
    pub line: u32,
    pub column: u32,
}
