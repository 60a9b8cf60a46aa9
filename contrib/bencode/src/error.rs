use thiserror::Error;

/// Result alias for decoder failures.
pub type ParseResult<T> = Result<T, ParseError>;

/// Decoder failure, carrying the byte offset the decoder stopped at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at byte {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("invalid byte at {pos}")]
    InvalidByte { pos: usize },

    #[error("integer with no delimiter at {pos}")]
    IntNoDelimiter { pos: usize },

    #[error("negative zero integer at {pos}")]
    IntNegativeZero { pos: usize },

    #[error("zero padded integer at {pos}")]
    IntZeroPadding { pos: usize },

    #[error("unparsable integer at {pos}")]
    IntUnparsable { pos: usize },

    #[error("byte string length overflows the buffer at {pos}")]
    LengthOverflow { pos: usize },

    #[error("recursion limit exceeded at {pos}")]
    RecursionExceeded { pos: usize },

    #[error("dictionary key out of order at {pos}")]
    KeyOrdering { pos: usize },

    #[error("duplicate dictionary key at {pos}")]
    KeyDuplicate { pos: usize },

    #[error("trailing bytes after the value at {pos}")]
    TrailingBytes { pos: usize },
}
