//! Implements the cumulative frequency table shared by the encoder and decoder.

use num_traits::PrimInt;

use crate::quantizer::{cum_freq_to_prob, prob_to_cum_freq};
use crate::{Error, Result, MAX_TOTAL};

/// A validated cumulative frequency table.
///
/// The table partitions `[0, total)` into one sub-interval per symbol. Symbol `s`
/// owns `[c[s], c[s + 1])`. Neighbouring entries may be equal, which marks a symbol
/// with zero probability. Such a symbol can be part of the alphabet, but it can't be
/// encoded.
///
/// Tables are validated once on creation and can then be reused for any number of
/// encode / decode calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CumFreqTable {
    cum_freq: Vec<u32>,
}

impl CumFreqTable {
    /// Creates a new table from cumulative frequencies of any primitive integer type.
    ///
    /// # Arguments
    /// * `cum_freq` - The cumulative frequencies. Must start with 0, be non-decreasing
    ///                and contain at least two entries (one symbol).
    ///
    /// # Errors
    /// * `PrecisionOverflow` - An entry doesn't fit into 32 unsigned bits (this includes
    ///                         negative entries) or the total is at least `MAX_TOTAL`.
    /// * `InvalidTable`      - The table is too short, doesn't start with 0, decreases
    ///                         or has a total of 0.
    pub fn new<T: PrimInt>(cum_freq: &[T]) -> Result<Self> {
        if cum_freq.len() < 2 {
            return Err(Error::InvalidTable(
                "the table needs at least 2 entries (1 symbol)",
            ));
        }

        let cum_freq = cum_freq
            .iter()
            .map(|c| {
                c.to_u32().ok_or(Error::PrecisionOverflow(
                    "table entries must be non-negative and fit into 32 bits",
                ))
            })
            .collect::<Result<Vec<u32>>>()?;

        if cum_freq[0] != 0 {
            return Err(Error::InvalidTable("the table must start with 0"));
        }
        if cum_freq.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidTable("table entries must be non-decreasing"));
        }

        let total = cum_freq[cum_freq.len() - 1];
        if total >= MAX_TOTAL {
            return Err(Error::PrecisionOverflow(
                "the table total exceeds the maximal resolution of the coder",
            ));
        }
        if total == 0 {
            return Err(Error::InvalidTable(
                "the table has no symbol with a non-zero frequency",
            ));
        }

        Ok(Self { cum_freq })
    }

    /// Quantizes a probability distribution and validates the result.
    ///
    /// See `prob_to_cum_freq()` for the quantization rules.
    pub fn from_probabilities(prob: &[f64], resolution: u32) -> Result<Self> {
        Self::new(&prob_to_cum_freq(prob, resolution))
    }

    /// Returns the number of symbols in the alphabet.
    #[inline]
    pub fn num_symbols(&self) -> usize {
        self.cum_freq.len() - 1
    }

    /// Returns the sum of all frequencies.
    #[inline]
    pub fn total(&self) -> u32 {
        self.cum_freq[self.cum_freq.len() - 1]
    }

    /// Returns the raw cumulative frequencies.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.cum_freq
    }

    /// Returns the probability distribution the table represents.
    pub fn probabilities(&self) -> Vec<f64> {
        cum_freq_to_prob(&self.cum_freq)
    }

    /// Returns the interval `[fl, fh)` of a symbol that is about to be encoded.
    ///
    /// # Errors
    /// * `InvalidTable` - The symbol is outside of the alphabet or has zero frequency.
    pub fn interval(&self, symbol: usize) -> Result<(u32, u32)> {
        if symbol >= self.num_symbols() {
            return Err(Error::InvalidTable(
                "a symbol is too large or the table is too short",
            ));
        }

        let fl = self.cum_freq[symbol];
        let fh = self.cum_freq[symbol + 1];
        if fl == fh {
            return Err(Error::InvalidTable(
                "cannot encode a symbol with zero frequency",
            ));
        }

        Ok((fl, fh))
    }

    /// Finds the symbol `s` with `c[s] <= value < c[s + 1]`.
    ///
    /// `value` must be smaller than the total. Zero-width symbols can't contain any value
    /// and are skipped by the search.
    #[inline]
    pub(crate) fn symbol_at(&self, value: u32) -> usize {
        debug_assert!(value < self.total());
        self.cum_freq[1..].partition_point(|&c| c <= value)
    }
}
