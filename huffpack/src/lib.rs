//! # huffpack - Huffman File Compression
//!
//! Compresses files with a static Huffman code. The symbol → code table is a
//! [`wbtmap::ThreadedMap`], so every code lookup during encoding goes through
//! the weight-balanced threaded tree.
//!
//! ## File format
//!
//! A `.huf` file is the frequency table header followed by the code bits,
//! packed MSB first and zero-padded to a whole byte:
//!
//! ```text
//! "HUF1" | entries: u16 LE | (symbol: u16 LE, count: u64 LE) * entries | bits...
//! ```
//!
//! The end-of-data symbol ([`EOF_SYMBOL`]) is always in the table, so the
//! decoder stops on its code and never looks at the padding.
//!
//! ## Example
//!
//! ```rust
//! use huffpack::{build_encoding_map, encode, HuffmanTree, Source, build_frequency_map};
//!
//! let freq = build_frequency_map(Source::Bytes(b"aaabbc")).unwrap();
//! let tree = HuffmanTree::build(&freq).unwrap();
//! let codes = build_encoding_map(&tree);
//!
//! let encoded = encode(b"aaabbc", &codes).unwrap();
//! assert_eq!(encoded.bits, "0001010110111");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod codec;
pub mod error;
pub mod frequency;
pub mod tree;

pub use bitstream::{BitReader, BitWriter};
pub use codec::{compress, decode, decompress, encode, Codec, Encoded};
pub use error::{CodecError, Result};
pub use frequency::{build_frequency_map, FrequencyTable, Source};
pub use tree::{build_encoding_map, HuffmanNode, HuffmanTree};

/// A Huffman symbol: a byte value, or one of the reserved codes above 255.
pub type Symbol = u16;

/// End-of-data marker. Always present in a frequency table with count 1.
pub const EOF_SYMBOL: Symbol = 256;

/// Tag of internal Huffman tree nodes. Never stored in a frequency table.
pub const INTERNAL_SYMBOL: Symbol = 257;

/// File naming configuration for [`Codec`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Extension appended to compressed files (without the dot)
    pub compressed_extension: String,
    /// Suffix added to the file stem of decompressed output
    pub uncompressed_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compressed_extension: "huf".to_string(),
            uncompressed_suffix: "_unc".to_string(),
        }
    }
}
