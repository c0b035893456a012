//! Symbol frequency counting and the `.huf` header.
//!
//! Counts live in a [`ThreadedMap`] keyed by symbol, so keys come back in
//! ascending order and tree construction is deterministic.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use tracing::debug;
use wbtmap::ThreadedMap;

use crate::{CodecError, Result, Symbol, EOF_SYMBOL};

const HEADER_MAGIC: &[u8; 4] = b"HUF1";
const READ_CHUNK: usize = 64 * 1024;

/// Occurrence count per symbol.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: ThreadedMap<Symbol, u64>,
}

impl FrequencyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `symbol` has an entry.
    pub fn contains_key(&self, symbol: Symbol) -> bool {
        self.counts.contains_key(&symbol)
    }

    /// Count for `symbol`, 0 when absent.
    pub fn get(&self, symbol: Symbol) -> u64 {
        self.counts.get_or_default(&symbol)
    }

    /// Set the count for `symbol`.
    pub fn put(&mut self, symbol: Symbol, count: u64) {
        self.counts.put(symbol, count);
    }

    /// Add one occurrence of `symbol`, creating it at 1.
    pub fn increment(&mut self, symbol: Symbol) {
        *self.counts.get_or_insert_default(symbol) += 1;
    }

    /// Count every byte of `bytes`.
    pub fn count_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.increment(Symbol::from(byte));
        }
    }

    /// Count every byte `reader` yields. Returns the number of bytes read.
    pub fn count_reader<R: Read>(&mut self, mut reader: R) -> io::Result<u64> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.count_bytes(&buf[..n]);
            total += n as u64;
        }
    }

    /// Symbols in ascending order.
    pub fn keys(&self) -> Vec<Symbol> {
        self.counts.keys().copied().collect()
    }

    /// `(symbol, count)` pairs in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, u64)> + '_ {
        self.counts.iter().map(|(&symbol, &count)| (symbol, count))
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the table has no symbols.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.iter().fold(0u64, |acc, (_, count)| acc.saturating_add(count))
    }

    /// Serialize the table as a `.huf` header.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        if let Some(bad) = self.keys().into_iter().find(|&s| s > EOF_SYMBOL) {
            return Err(CodecError::InvalidSymbol(bad));
        }
        // At most 257 symbols remain, so the entry count fits a u16.
        let entries = self.len() as u16;

        out.write_all(HEADER_MAGIC)?;
        out.write_all(&entries.to_le_bytes())?;
        for (symbol, count) in self.iter() {
            out.write_all(&symbol.to_le_bytes())?;
            out.write_all(&count.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a table written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(mut input: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_header_bytes(&mut input, &mut magic)?;
        if &magic != HEADER_MAGIC {
            return Err(CodecError::BadMagic);
        }

        let mut entries = [0u8; 2];
        read_header_bytes(&mut input, &mut entries)?;
        let entries = u16::from_le_bytes(entries);

        let mut table = Self::new();
        for _ in 0..entries {
            let mut symbol = [0u8; 2];
            let mut count = [0u8; 8];
            read_header_bytes(&mut input, &mut symbol)?;
            read_header_bytes(&mut input, &mut count)?;

            let symbol = Symbol::from_le_bytes(symbol);
            if symbol > EOF_SYMBOL {
                return Err(CodecError::InvalidSymbol(symbol));
            }
            table.put(symbol, u64::from_le_bytes(count));
        }
        Ok(table)
    }
}

fn read_header_bytes<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CodecError::TruncatedHeader,
        _ => CodecError::Io(e),
    })
}

/// Where [`build_frequency_map`] reads its bytes from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// The contents of a file
    File(&'a Path),
    /// An in-memory buffer
    Bytes(&'a [u8]),
}

/// Count the bytes of `source` and add [`EOF_SYMBOL`] with count 1.
pub fn build_frequency_map(source: Source<'_>) -> Result<FrequencyTable> {
    let mut table = FrequencyTable::new();
    match source {
        Source::File(path) => {
            let bytes = table.count_reader(BufReader::new(File::open(path)?))?;
            debug!(path = %path.display(), bytes, "counted file bytes");
        }
        Source::Bytes(bytes) => table.count_bytes(bytes),
    }
    table.put(EOF_SYMBOL, 1);
    Ok(table)
}
