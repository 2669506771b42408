//! Implements the range encoder.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use num_traits::PrimInt;

use crate::range_coder::{Tell, CODE_BITS, CODE_SHIFT, CODE_TOP, SYM_BITS, SYM_MAX};
use crate::{CumFreqTable, Error, Result};

/// The range encoder.
///
/// Symbols are encoded with a cumulative frequency table that may change from call to
/// call, as long as the decoder uses the same tables in the same order. The output is a
/// raw byte stream without any header.
///
/// Bytes are written one at a time. Wrap unbuffered sinks like a `File` into a
/// `BufWriter` (or use `RangeEncoder::create()`).
///
/// The encoder must be closed to flush the final bytes. This happens on `close()`,
/// `finish()` or when the encoder is dropped.
#[derive(Debug)]
pub struct RangeEncoder<W: Write> {
    /// The output sink. `None` once the encoder is closed.
    sink: Option<W>,
    /// The number of bytes written to the sink.
    offs: usize,
    /// The total number of whole bits shifted out of the state registers.
    bits_total: u64,
    /// The number of values in the current range.
    rng: u32,
    /// The low end of the current range.
    val: u32,
    /// The number of outstanding carry propagating 0xFF symbols.
    ext: usize,
    /// A buffered output symbol, awaiting carry propagation.
    rem: Option<u8>,
}

impl<W: Write> Tell for RangeEncoder<W> {
    #[inline(always)]
    fn bits_total(&self) -> u64 {
        self.bits_total
    }

    #[inline(always)]
    fn range(&self) -> u32 {
        self.rng
    }
}

impl RangeEncoder<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and encodes into it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::debug!("Encoding into {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RangeEncoder<W> {
    /// Creates a new encoder writing into the given sink.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            offs: 0,
            bits_total: u64::from(CODE_BITS),
            rng: u32::MAX,
            val: 0,
            ext: 0,
            rem: None,
        }
    }

    /// Returns the number of bytes written to the sink so far.
    ///
    /// Includes the final bytes once the encoder is closed.
    pub fn bytes_written(&self) -> usize {
        self.offs
    }

    /// Returns true once the encoder was closed and released its sink.
    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Encodes a list of symbols using the given cumulative frequency table.
    ///
    /// # Arguments
    /// * `symbols`  - Indices into the cumulative frequency table.
    /// * `cum_freq` - The cumulative frequencies. The table has one more entry than
    ///                there are symbols in the alphabet.
    ///
    /// # Errors
    /// * `ClosedResource`    - The encoder is closed.
    /// * `InvalidTable`      - The table is malformed, or a symbol is outside of the
    ///                         alphabet or has zero frequency.
    /// * `PrecisionOverflow` - An entry or the total of the table is too large.
    /// * `Io`                - Writing to the sink failed.
    ///
    /// Nothing is encoded if the table or any of the symbols is invalid.
    pub fn encode<T: PrimInt>(&mut self, symbols: &[usize], cum_freq: &[T]) -> Result<()> {
        self.ensure_open()?;
        let table = CumFreqTable::new(cum_freq)?;
        self.encode_with_table(symbols, &table)
    }

    /// Encodes a list of symbols using an already validated table.
    ///
    /// See `encode()`.
    pub fn encode_with_table(&mut self, symbols: &[usize], table: &CumFreqTable) -> Result<()> {
        self.ensure_open()?;

        // Validate all symbols first, so that a failing call leaves the state untouched.
        for &symbol in symbols {
            table.interval(symbol)?;
        }

        log::trace!(
            "Encoding {} symbols with {} symbol table (total {})",
            symbols.len(),
            table.num_symbols(),
            table.total()
        );

        let ft = table.total();
        for &symbol in symbols {
            let (fl, fh) = table.interval(symbol)?;
            self.encode_interval(fl, fh, ft)?;
        }

        Ok(())
    }

    /// Flushes all pending bytes and releases the sink.
    ///
    /// Closing an already closed encoder does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        let done = self.done();
        let sink = self.sink.take();
        done?;

        if let Some(mut sink) = sink {
            sink.flush()?;
        }
        log::debug!("Closed range encoder after {} bytes", self.offs);

        Ok(())
    }

    /// Flushes all pending bytes and returns the sink.
    ///
    /// # Errors
    /// * `ClosedResource` - The encoder was already closed.
    /// * `Io`             - Writing to the sink failed.
    pub fn finish(mut self) -> Result<W> {
        self.ensure_open()?;

        let done = self.done();
        let sink = self.sink.take();
        done?;

        let mut sink = sink.ok_or(Error::ClosedResource)?;
        sink.flush()?;
        log::debug!("Finished range encoder after {} bytes", self.offs);

        Ok(sink)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::ClosedResource)
        } else {
            Ok(())
        }
    }

    /// Writes a run of identical bytes.
    fn write_bytes(&mut self, value: u8, count: usize) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::ClosedResource)?;
        for _ in 0..count {
            sink.write_all(&[value])?;
        }
        self.offs += count;

        Ok(())
    }

    /// Adds a carry to the buffered symbol.
    ///
    /// The buffered symbol is incremented and every outstanding 0xFF symbol wraps
    /// around to 0x00. If there are outstanding symbols, the buffered symbol is
    /// final now, and the last wrapped symbol becomes the new buffered one.
    fn carry_out(&mut self) -> Result<()> {
        // There can't be a carry before the first symbol was shifted out, since
        // `val + rng` starts at `u32::MAX` and never grows.
        if let Some(rem) = self.rem {
            let rem = rem.wrapping_add(1);
            if self.ext > 0 {
                self.write_bytes(rem, 1)?;
                self.write_bytes(0x00, self.ext - 1)?;
                self.ext = 0;
                self.rem = Some(0x00);
            } else {
                self.rem = Some(rem);
            }
        }

        Ok(())
    }

    /// Outputs a symbol that was shifted out of `val`.
    ///
    /// 0xFF symbols could still be changed by a carry, so they are only counted.
    /// Any other symbol settles the buffered symbol and the outstanding 0xFF run.
    fn shift_out(&mut self, c: u8) -> Result<()> {
        match self.rem {
            // Don't output a byte on the first write.
            None => self.rem = Some(c),
            Some(_) if c == SYM_MAX => self.ext += 1,
            Some(rem) => {
                self.write_bytes(rem, 1)?;
                self.write_bytes(SYM_MAX, self.ext)?;
                self.ext = 0;
                self.rem = Some(c);
            }
        }

        Ok(())
    }

    /// Normalizes the contents of val and range so that range lies entirely
    /// in the high-order symbol.
    fn normalize(&mut self) -> Result<()> {
        // If the range is too small, output some bits and rescale it.
        while self.rng < CODE_TOP {
            self.shift_out((self.val >> CODE_SHIFT) as u8)?;
            self.val <<= SYM_BITS;
            self.rng <<= SYM_BITS;
            self.bits_total += u64::from(SYM_BITS);
        }

        Ok(())
    }

    /// Encodes a symbol given its frequency information.
    ///
    /// # Argument
    /// * `fl` - The cumulative frequency of all symbols that come before the one to be
    ///          encoded.
    /// * `fh` - The cumulative frequency of all symbols up to and including the one to
    ///          be encoded. Together with fl, this defines the range [fl,fh) in
    ///          which the decoded value will fall.
    /// * `ft` - The sum of the frequencies of all the symbols.
    ///
    /// The last symbol of the alphabet also receives the remainder of `rng / ft`.
    fn encode_interval(&mut self, fl: u32, fh: u32, ft: u32) -> Result<()> {
        let r = self.rng / ft;
        if fh < ft {
            self.rng = r * (fh - fl);
        } else {
            self.rng -= r * fl;
        }

        let (val, carry) = self.val.overflowing_add(r * fl);
        self.val = val;
        if carry {
            self.carry_out()?;
        }

        self.normalize()
    }

    /// Indicates that there are no more symbols to encode.
    ///
    /// Outputs the shortest prefix that lies within the final range when it's padded
    /// with zero bytes, together with all buffered symbols.
    fn done(&mut self) -> Result<()> {
        let low = u64::from(self.val);
        let high = low + u64::from(self.rng);

        let mut bytes = CODE_BITS / SYM_BITS;
        let mut end = low;
        for n in 1..=CODE_BITS / SYM_BITS {
            let mask = (1_u64 << (CODE_BITS - n * SYM_BITS)) - 1;
            let rounded = (low + mask) & !mask;
            if rounded < high {
                bytes = n;
                end = rounded;
                break;
            }
        }

        if end > u64::from(u32::MAX) {
            self.carry_out()?;
        }

        if let Some(rem) = self.rem.take() {
            self.write_bytes(rem, 1)?;
        }
        let ext = self.ext;
        self.write_bytes(SYM_MAX, ext)?;
        self.ext = 0;

        let mut end = end as u32;
        for _ in 0..bytes {
            self.write_bytes((end >> CODE_SHIFT) as u8, 1)?;
            end <<= SYM_BITS;
        }

        Ok(())
    }
}

impl<W: Write> Drop for RangeEncoder<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Failed to flush range encoder on drop: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_empty_stream() {
        let enc = RangeEncoder::new(Vec::new());
        let buffer = enc.finish().unwrap();
        assert_eq!(buffer, vec![0x00]);
    }

    #[test]
    fn test_startup_transient() {
        let mut enc = RangeEncoder::new(Vec::new());
        enc.encode(&[0, 0, 0, 0, 1, 2], &[0, 4, 6, 8]).unwrap();
        // Nothing is written until the first byte is settled.
        assert_eq!(enc.bytes_written(), 0);

        let buffer = enc.finish().unwrap();
        assert_eq!(buffer, vec![0x0B]);
    }

    #[test]
    fn test_repeated_sequence() {
        let mut enc = RangeEncoder::new(Vec::new());
        for _ in 0..17 {
            enc.encode(&[0, 0, 0, 0, 1, 2], &[0, 4, 6, 8]).unwrap();
        }
        let buffer = enc.finish().unwrap();

        let mut expected = vec![0x0B_u8; 17];
        expected[3] = 0x01;
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_precision_overflow() {
        let mut enc = RangeEncoder::new(Vec::new());
        let cum_freq: [u64; 4] = [0, 10, 60, 1 << 32];
        assert!(matches!(
            enc.encode(&[2, 2], &cum_freq),
            Err(Error::PrecisionOverflow(_))
        ));
        assert!(matches!(
            enc.encode(&[0], &[-1_i32, 1]),
            Err(Error::PrecisionOverflow(_))
        ));
        assert_eq!(enc.finish().unwrap(), vec![0x00]);
    }

    #[test]
    fn test_invalid_tables() {
        let data = [0, 0, 0, 0, 1, 2];
        let mut enc = RangeEncoder::new(Vec::new());
        let empty: [u32; 0] = [];

        assert!(matches!(
            enc.encode(&data, &[1, 2, 3]),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(
            enc.encode(&data, &[0, 1]),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(
            enc.encode(&data, &[0, 8, 8, 8]),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(
            enc.encode(&data, &empty),
            Err(Error::InvalidTable(_))
        ));
        assert!(matches!(
            enc.encode(&data, &[0]),
            Err(Error::InvalidTable(_))
        ));

        // Failed calls leave no trace in the stream.
        enc.encode(&data, &[0, 4, 6, 8]).unwrap();
        assert_eq!(enc.finish().unwrap(), vec![0x0B]);
    }

    #[test]
    fn test_failed_call_keeps_encoder_usable() {
        let mut enc = RangeEncoder::new(Vec::new());
        enc.encode(&[0, 1], &[0, 4, 6, 8]).unwrap();
        assert!(matches!(
            enc.encode(&[0, 1, 7], &[0, 4, 6, 8]),
            Err(Error::InvalidTable(_))
        ));
        enc.encode(&[2, 2], &[0, 4, 6, 8]).unwrap();
        let with_failure = enc.finish().unwrap();

        let mut enc = RangeEncoder::new(Vec::new());
        enc.encode(&[0, 1], &[0, 4, 6, 8]).unwrap();
        enc.encode(&[2, 2], &[0, 4, 6, 8]).unwrap();
        assert_eq!(with_failure, enc.finish().unwrap());
    }

    #[test]
    fn test_carry_propagation() {
        // Symbol 2 sits at the top of the range and produces 0xFF bytes, which are
        // later resolved by a carry into the buffered byte.
        let mut enc = RangeEncoder::new(Vec::new());
        enc.encode(&[0, 2, 0, 2, 2, 2, 1, 1, 2, 2, 2, 2], &[0, 1, 255, 256])
            .unwrap();
        let buffer = enc.finish().unwrap();

        assert_eq!(
            buffer,
            vec![0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFE, 0xFE, 0x01, 0xFF, 0xFF, 0x04]
        );
    }

    #[test]
    fn test_close_and_drop_flush() {
        let mut buffer = Vec::new();
        {
            let mut enc = RangeEncoder::new(&mut buffer);
            enc.encode(&[0, 0, 0, 0, 1, 2], &[0, 4, 6, 8]).unwrap();
        }
        assert_eq!(buffer, vec![0x0B]);

        let mut buffer = Vec::new();
        let mut enc = RangeEncoder::new(&mut buffer);
        enc.encode(&[0, 0, 0, 0, 1, 2], &[0, 4, 6, 8]).unwrap();
        enc.close().unwrap();
        assert_eq!(enc.bytes_written(), 1);
        assert!(matches!(
            enc.encode(&[0], &[0, 4, 6, 8]),
            Err(Error::ClosedResource)
        ));
        drop(enc);
        assert_eq!(buffer, vec![0x0B]);
    }
}
