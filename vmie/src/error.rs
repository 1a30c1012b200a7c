use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("stack underflow: needed {needed}, had {had}")]
    StackUnderflow { needed: usize, had: usize },
    #[error("return stack underflow")]
    ReturnStackUnderflow,
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i32, len: usize },
    #[error("unknown global {0}")]
    UnknownGlobal(i32),
    #[error("unknown map key")]
    UnknownMapKey,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown opcode word {0}")]
    UnknownOpcode(i32),
    #[error("program counter {0} out of bounds")]
    PcOutOfBounds(i32),
    #[error("halt instruction reached")]
    Halted,
    #[error("scratch arena out of memory: requested {requested}, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error("arena handle does not refer to the most recent allocation")]
    NotMostRecentAllocation,
}
