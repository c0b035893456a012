//! Encoding, decoding and the file-level compress / decompress entry points.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wbtmap::ThreadedMap;

use crate::bitstream::{BitReader, BitWriter};
use crate::frequency::{build_frequency_map, FrequencyTable, Source};
use crate::tree::{build_encoding_map, HuffmanTree};
use crate::{CodecError, Config, Result, Symbol, EOF_SYMBOL};

/// The code bits of an input, as `'0'` / `'1'` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Concatenated codes, ending with the end-of-data code.
    pub bits: String,
    /// Number of bits in `bits`.
    pub bit_len: usize,
}

impl Encoded {
    /// Emit every bit to `out`.
    pub fn write_to<W: Write>(&self, out: &mut BitWriter<W>) -> io::Result<()> {
        for c in self.bits.bytes() {
            out.write_bit(c == b'1')?;
        }
        Ok(())
    }
}

/// Concatenate the code of every byte of `input`, then the end-of-data code.
pub fn encode(input: &[u8], codes: &ThreadedMap<Symbol, String>) -> Result<Encoded> {
    let mut bits = String::new();
    for symbol in input.iter().map(|&b| Symbol::from(b)).chain([EOF_SYMBOL]) {
        let code = codes.get(&symbol).ok_or(CodecError::MissingCode(symbol))?;
        bits.push_str(code);
    }
    let bit_len = bits.len();
    Ok(Encoded { bits, bit_len })
}

/// Walk `tree` one bit at a time, emitting a byte at every leaf, until the
/// end-of-data leaf. The decoded bytes are written to `output` and returned.
///
/// Running out of bits first is [`CodecError::StreamExhausted`].
pub fn decode<R: Read, W: Write>(
    input: &mut BitReader<R>,
    tree: &HuffmanTree,
    output: &mut W,
) -> Result<Vec<u8>> {
    if !tree.has_eof() {
        return Err(CodecError::MissingCode(EOF_SYMBOL));
    }

    let mut decoded = Vec::new();
    let root = tree.root_index();
    // Empty input: the end-of-data leaf is the whole tree.
    if !tree.root().is_leaf() {
        let mut at = root;
        loop {
            let Some(bit) = input.read_bit()? else {
                return Err(CodecError::StreamExhausted {
                    decoded: decoded.len(),
                });
            };
            at = tree.step(at, bit);

            let node = tree.node(at);
            if !node.is_leaf() {
                continue;
            }
            if node.symbol == EOF_SYMBOL {
                break;
            }
            let byte =
                u8::try_from(node.symbol).map_err(|_| CodecError::InvalidSymbol(node.symbol))?;
            decoded.push(byte);
            at = root;
        }
    }

    output.write_all(&decoded)?;
    Ok(decoded)
}

/// Compresses and decompresses files following the `.huf` naming convention.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: Config,
}

impl Codec {
    /// Codec with the default [`Config`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `name.ext` → `name.ext.huf`
    pub fn compressed_path(&self, input: &Path) -> PathBuf {
        let mut name = input.as_os_str().to_owned();
        name.push(".");
        name.push(&self.config.compressed_extension);
        PathBuf::from(name)
    }

    /// `name.ext.huf` → `name_unc.ext`
    ///
    /// Without a `.huf` suffix the whole file name is treated as `name.ext`;
    /// without an extension the result is `name_unc`.
    pub fn decompressed_path(&self, input: &Path) -> PathBuf {
        let file_name = Path::new(input.file_name().unwrap_or_default());
        let original = match (file_name.file_stem(), file_name.extension()) {
            (Some(stem), Some(ext)) if ext == self.config.compressed_extension.as_str() => {
                Path::new(stem)
            }
            _ => file_name,
        };

        // Built from OsStr pieces so non-UTF-8 names survive unchanged.
        let mut output = OsString::new();
        match (original.file_stem(), original.extension()) {
            (Some(stem), Some(ext)) => {
                output.push(stem);
                output.push(&self.config.uncompressed_suffix);
                output.push(".");
                output.push(ext);
            }
            _ => {
                output.push(original.as_os_str());
                output.push(&self.config.uncompressed_suffix);
            }
        }
        input.with_file_name(output)
    }

    /// Compress `path` into [`compressed_path`](Self::compressed_path) and
    /// return the code bits.
    pub fn compress(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let input = fs::read(path)?;

        let freq = build_frequency_map(Source::Bytes(&input))?;
        let codes = build_encoding_map(&HuffmanTree::build(&freq)?);
        let encoded = encode(&input, &codes)?;

        let out_path = self.compressed_path(path);
        let mut out = BufWriter::new(File::create(&out_path)?);
        freq.write_to(&mut out)?;
        let mut bits = BitWriter::new(out);
        encoded.write_to(&mut bits)?;
        bits.finish()?;

        info!(
            input = %path.display(),
            output = %out_path.display(),
            bytes = input.len(),
            bits = encoded.bit_len,
            "compressed"
        );
        Ok(encoded.bits)
    }

    /// Decompress `path` into [`decompressed_path`](Self::decompressed_path)
    /// and return the decoded bytes.
    pub fn decompress(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let freq = FrequencyTable::read_from(&mut reader)?;
        debug!(symbols = freq.len(), total = freq.total(), "read frequency header");
        let tree = HuffmanTree::build(&freq)?;

        let out_path = self.decompressed_path(path);
        let mut out = BufWriter::new(File::create(&out_path)?);
        let decoded = match decode(&mut BitReader::new(reader), &tree, &mut out) {
            Ok(decoded) => decoded,
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(&out_path);
                return Err(e);
            }
        };
        out.flush()?;

        info!(
            input = %path.display(),
            output = %out_path.display(),
            bytes = decoded.len(),
            "decompressed"
        );
        Ok(decoded)
    }
}

/// Compress `path` to `path.huf` with the default configuration.
pub fn compress(path: impl AsRef<Path>) -> Result<String> {
    Codec::default().compress(path)
}

/// Decompress a `.huf` file with the default configuration.
pub fn decompress(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    Codec::default().decompress(path)
}
