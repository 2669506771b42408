#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
//! A fast range coder with carry propagation.
//!
//! The crate provides a pair of symmetric state machines, the `RangeEncoder` and the
//! `RangeDecoder`, that turn a sequence of symbol indices into a compact byte stream
//! and back. The probability model is supplied by the caller as a cumulative frequency
//! table on every call, so the model can adapt between calls:
//!
//! * A table `[0, 4, 6, 8]` describes three symbols with the probabilities
//!   `4/8`, `2/8` and `2/8`.
//! * Equal neighbours mark symbols with zero probability. They can be part of the
//!   alphabet, but can't be encoded.
//! * The total must be smaller than `MAX_TOTAL`.
//!
//! `prob_to_cum_freq()` converts a floating point distribution into such a table,
//! while making sure that every symbol with a non-zero probability stays encodable.
//!
//! The stream has no header. The decoder has to be called with the same tables in the
//! same order, and with the number of symbols of each call.
//!
//! ```
//! use range_coder::{RangeDecoder, RangeEncoder};
//!
//! # fn main() -> Result<(), range_coder::Error> {
//! let cum_freq = [0, 4, 6, 8];
//! let data = [0, 2, 1, 0, 0, 2];
//!
//! let mut encoder = RangeEncoder::new(Vec::new());
//! encoder.encode(&data, &cum_freq)?;
//! let stream = encoder.finish()?;
//!
//! let mut decoder = RangeDecoder::new(stream.as_slice())?;
//! assert_eq!(decoder.decode(data.len(), &cum_freq)?, data);
//! # Ok(())
//! # }
//! ```
pub use error::*;
pub use quantizer::{cum_freq_to_prob, prob_to_cum_freq, DEFAULT_RESOLUTION};
#[cfg(feature = "decoder")]
pub use range_coder::RangeDecoder;
#[cfg(feature = "encoder")]
pub use range_coder::RangeEncoder;
pub use range_coder::Tell;
pub use table::CumFreqTable;

mod error;
mod quantizer;
mod range_coder;
mod table;

/// Exclusive upper bound for the total of a cumulative frequency table.
///
/// The coders renormalize once their range drops below this value, so every symbol
/// still gets at least one value of the range.
pub const MAX_TOTAL: u32 = 1 << 24;
