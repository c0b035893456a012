//! Error handling for huffpack.

use thiserror::Error;

use crate::Symbol;

/// Errors raised while building, writing or reading compressed data.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CodecError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the huffpack header magic
    #[error("not a huffpack file: bad header magic")]
    BadMagic,

    /// The frequency header ended early
    #[error("frequency header is truncated")]
    TruncatedHeader,

    /// A frequency table entry names a symbol that is neither a byte nor EOF
    #[error("invalid symbol {0} in frequency table")]
    InvalidSymbol(Symbol),

    /// The symbol counts add up to more than a `u64` holds
    #[error("symbol counts overflow a 64-bit total")]
    CountOverflow,

    /// No symbols to build a Huffman tree from
    #[error("frequency table is empty")]
    EmptyFrequencyTable,

    /// A symbol has no code in the encoding map
    #[error("no code assigned to symbol {0}")]
    MissingCode(Symbol),

    /// The bit stream ran out before the end-of-data code
    #[error("bit stream ended after {decoded} decoded bytes without an end-of-data marker")]
    StreamExhausted {
        /// Bytes decoded before the stream ran out
        decoded: usize,
    },
}

/// Result type for huffpack operations.
pub type Result<T> = std::result::Result<T, CodecError>;
