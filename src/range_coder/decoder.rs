//! Implements the range decoder.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use num_traits::PrimInt;

use crate::range_coder::{Tell, CODE_BITS, CODE_BYTES, CODE_TOP, SYM_BITS};
use crate::{CumFreqTable, Error, Result};

/// The range decoder.
///
/// Reverses the `RangeEncoder`: given the same cumulative frequency tables in the same
/// order, it reproduces the encoded symbols. The stream carries no length information,
/// so the caller has to know how many symbols to decode.
///
/// Reading past the end of the source yields zero bytes. This is never an error, since
/// the encoder terminates its output with exactly that padding in mind. Any sequential
/// source works, including endless ones.
///
/// Bytes are read one at a time. Wrap unbuffered sources like a `File` into a
/// `BufReader` (or use `RangeDecoder::open()`).
#[derive(Debug)]
pub struct RangeDecoder<R: Read> {
    /// The input source. `None` once the decoder is closed.
    source: Option<R>,
    /// Set once the source reported its end.
    exhausted: bool,
    /// The number of bytes read from the source.
    offs: usize,
    /// The total number of whole bits shifted through the state registers.
    /// This does not include the bytes read to fill the initial code window.
    bits_total: u64,
    /// The number of values in the current range.
    rng: u32,
    /// The difference between the input value and the low end of the current range.
    val: u32,
}

impl<R: Read> Tell for RangeDecoder<R> {
    #[inline(always)]
    fn bits_total(&self) -> u64 {
        self.bits_total
    }

    #[inline(always)]
    fn range(&self) -> u32 {
        self.rng
    }
}

impl RangeDecoder<BufReader<File>> {
    /// Opens the file at `path` and decodes from it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        log::debug!("Decoding from {}", path.as_ref().display());
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> RangeDecoder<R> {
    /// Creates a new decoder from the given source.
    ///
    /// Reads the first bytes of the stream to fill the code window.
    pub fn new(source: R) -> Result<Self> {
        let mut dec = Self {
            source: Some(source),
            exhausted: false,
            offs: 0,
            bits_total: u64::from(CODE_BITS),
            rng: u32::MAX,
            val: 0,
        };

        for _ in 0..CODE_BYTES {
            dec.val = (dec.val << SYM_BITS) | u32::from(dec.read_byte()?);
        }

        Ok(dec)
    }

    /// Returns the number of bytes read from the source so far.
    pub fn bytes_read(&self) -> usize {
        self.offs
    }

    /// Returns true once the decoder was closed and released its source.
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Decodes a list of symbols using the given cumulative frequency table.
    ///
    /// # Arguments
    /// * `count`    - The number of symbols to decode.
    /// * `cum_freq` - The cumulative frequencies the symbols were encoded with.
    ///
    /// Returns the decoded symbol indices.
    ///
    /// # Errors
    /// * `ClosedResource`    - The decoder is closed.
    /// * `InvalidTable`      - The table is malformed.
    /// * `PrecisionOverflow` - An entry or the total of the table is too large.
    /// * `Io`                - Reading from the source failed.
    ///
    /// The table is validated even if `count` is 0.
    pub fn decode<T: PrimInt>(&mut self, count: usize, cum_freq: &[T]) -> Result<Vec<usize>> {
        self.ensure_open()?;
        let table = CumFreqTable::new(cum_freq)?;
        self.decode_with_table(count, &table)
    }

    /// Decodes a list of symbols using an already validated table.
    ///
    /// See `decode()`.
    pub fn decode_with_table(&mut self, count: usize, table: &CumFreqTable) -> Result<Vec<usize>> {
        self.ensure_open()?;

        log::trace!(
            "Decoding {} symbols with {} symbol table (total {})",
            count,
            table.num_symbols(),
            table.total()
        );

        (0..count).map(|_| self.decode_symbol(table)).collect()
    }

    /// Releases the source.
    ///
    /// Closing an already closed decoder does nothing.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed range decoder after {} bytes", self.offs);
        }
    }

    /// Releases and returns the source.
    ///
    /// The source is positioned after the last byte the decoder has read, which may be
    /// up to four bytes beyond the last byte of the decoded symbols.
    pub fn finish(mut self) -> Result<R> {
        self.source.take().ok_or(Error::ClosedResource)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::ClosedResource)
        } else {
            Ok(())
        }
    }

    /// Reads the next byte from the source, or 0 once it is exhausted.
    fn read_byte(&mut self) -> Result<u8> {
        if self.exhausted {
            return Ok(0);
        }

        let source = self.source.as_mut().ok_or(Error::ClosedResource)?;
        let mut buf = [0_u8; 1];
        loop {
            match source.read(&mut buf) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(0);
                }
                Ok(_) => {
                    self.offs += 1;
                    return Ok(buf[0]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Normalizes the contents of val and range so that range lies entirely
    /// in the high-order symbol.
    fn normalize(&mut self) -> Result<()> {
        // If the range is too small, rescale it and input some bits.
        while self.rng < CODE_TOP {
            self.rng <<= SYM_BITS;
            self.val = (self.val << SYM_BITS) | u32::from(self.read_byte()?);
            self.bits_total += u64::from(SYM_BITS);
        }

        Ok(())
    }

    /// Decodes the next symbol and advances the decoder past it.
    ///
    /// Mirrors `RangeEncoder::encode_interval()`, including the remainder the last
    /// symbol of the alphabet receives.
    fn decode_symbol(&mut self, table: &CumFreqTable) -> Result<usize> {
        let ft = table.total();
        let r = self.rng / ft;
        // Corrupt or random input can point beyond the total.
        let value = u32::min(self.val / r, ft - 1);

        let symbol = table.symbol_at(value);
        let cum_freq = table.as_slice();
        let fl = cum_freq[symbol];
        let fh = cum_freq[symbol + 1];

        self.val -= r * fl;
        if fh < ft {
            self.rng = r * (fh - fl);
        } else {
            self.rng -= r * fl;
        }
        self.normalize()?;

        Ok(symbol)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::io;

    use super::*;

    /// A source that fails on every read.
    struct BrokenSource;

    impl Read for BrokenSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "broken source"))
        }
    }

    /// A source that gets interrupted before every byte.
    struct InterruptedSource<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl<'a> Read for InterruptedSource<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(ErrorKind::Interrupted, "try again"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_zero_count() {
        let mut dec = RangeDecoder::new(&[0x0B_u8][..]).unwrap();
        assert!(dec.decode(0, &[0, 4, 6, 8]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_tables() {
        let mut dec = RangeDecoder::new(&[0x0B_u8][..]).unwrap();
        let empty: [u32; 0] = [];

        assert!(matches!(dec.decode(10, &empty), Err(Error::InvalidTable(_))));
        assert!(matches!(dec.decode(10, &[0]), Err(Error::InvalidTable(_))));
        assert!(matches!(dec.decode(0, &empty), Err(Error::InvalidTable(_))));
        assert!(matches!(
            dec.decode(10, &[1, 2, 3]),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(
            dec.decode(10, &[0_i64, 3, 1 << 33]),
            Err(Error::PrecisionOverflow(_))
        ));

        // The decoder is still usable.
        assert_eq!(
            dec.decode(6, &[0, 4, 6, 8]).unwrap(),
            vec![0, 0, 0, 0, 1, 2]
        );
    }

    #[test]
    fn test_decode_known_stream() {
        let mut stream = vec![0x0B_u8; 17];
        stream[3] = 0x01;

        let mut dec = RangeDecoder::new(stream.as_slice()).unwrap();
        let mut expected = Vec::new();
        for _ in 0..17 {
            let symbols = dec.decode(6, &[0, 4, 6, 8]).unwrap();
            assert_eq!(symbols, vec![0, 0, 0, 0, 1, 2]);
            expected.extend(symbols);
        }
        assert_eq!(expected.len(), 102);
        assert_eq!(dec.bytes_read(), 17);
    }

    #[test]
    fn test_decode_carry_stream() {
        let stream = [
            0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFE, 0xFE, 0x01, 0xFF, 0xFF, 0x04,
        ];
        let mut dec = RangeDecoder::new(&stream[..]).unwrap();
        assert_eq!(
            dec.decode(12, &[0, 1, 255, 256]).unwrap(),
            vec![0, 2, 0, 2, 2, 2, 1, 1, 2, 2, 2, 2]
        );
    }

    #[test]
    fn test_io_errors() {
        assert!(matches!(
            RangeDecoder::new(BrokenSource),
            Err(Error::Io(_))
        ));

        let source = InterruptedSource {
            data: &[0x0B],
            interrupt: false,
        };
        let mut dec = RangeDecoder::new(source).unwrap();
        assert_eq!(
            dec.decode(6, &[0, 4, 6, 8]).unwrap(),
            vec![0, 0, 0, 0, 1, 2]
        );
        assert_eq!(dec.bytes_read(), 1);
    }

    #[test]
    fn test_finish_returns_source() {
        let stream = [0x0B_u8, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        let mut dec = RangeDecoder::new(&stream[..]).unwrap();
        dec.decode(1, &[0, 4, 6, 8]).unwrap();
        // Only the initial code window was consumed.
        assert_eq!(dec.bytes_read(), 4);
        let rest = dec.finish().unwrap();
        assert_eq!(rest, &[0xDD_u8, 0xEE][..]);
    }
}
