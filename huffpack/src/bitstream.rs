//! Bit-level reader and writer over byte streams.
//!
//! Bits are packed MSB first. The writer zero-pads the final partial byte;
//! readers rely on the end-of-data code rather than the byte count to know
//! where the real bits stop.

use std::io::{self, Read, Write};

/// Packs single bits into bytes and writes them to `W`.
///
/// Call [`finish`](Self::finish) to flush the last partial byte; dropping the
/// writer without it loses up to seven bits.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    current: u8,
    filled: u8,
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Wrap `inner`. Anything already written to `inner` stays in front.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            current: 0,
            filled: 0,
            bits_written: 0,
        }
    }

    /// Append one bit.
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        if bit {
            self.current |= 0x80 >> self.filled;
        }
        self.filled += 1;
        self.bits_written += 1;
        if self.filled == 8 {
            self.inner.write_all(&[self.current])?;
            self.current = 0;
            self.filled = 0;
        }
        Ok(())
    }

    /// Total bits written so far, padding excluded.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// Pad and write the last partial byte, flush, and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.filled > 0 {
            self.inner.write_all(&[self.current])?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads single bits from `R`.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    inner: R,
    current: u8,
    remaining: u8,
}

impl<R: Read> BitReader<R> {
    /// Wrap `inner`, starting at its current position.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            current: 0,
            remaining: 0,
        }
    }

    /// Next bit, or `None` once the underlying stream is exhausted.
    pub fn read_bit(&mut self) -> io::Result<Option<bool>> {
        if self.remaining == 0 && !self.refill()? {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some((self.current >> self.remaining) & 1 == 1))
    }

    /// Whether no bits are left.
    pub fn is_eof(&mut self) -> io::Result<bool> {
        if self.remaining > 0 {
            return Ok(false);
        }
        Ok(!self.refill()?)
    }

    fn refill(&mut self) -> io::Result<bool> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(false),
                Ok(_) => {
                    self.current = byte[0];
                    self.remaining = 8;
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
