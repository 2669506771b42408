//! Implements the range coder.
//!
//! This is an entropy coder based upon [Mar79], which is itself a
//! rediscovery of the FIFO arithmetic code introduced by [Pas76].
//!
//! It is very similar to arithmetic encoding, except that encoding is done with
//! digits in any base, instead of with bits, and so it is faster when using
//! larger bases (i.e.: a byte).
//!
//! Both coders keep a 32 bit `range` register. Whenever it drops below 2^24, the top
//! byte of the encoder's `low` register can't change anymore, except through a carry
//! from the lower bits. It is shifted out and the registers are scaled up by one byte.
//! The encoder buffers the last shifted byte and any following run of 0xFF bytes until
//! it is known whether a carry reaches them.
//!
//! End of stream is handled by writing out the smallest number of bytes that
//! ensures that the stream will be correctly decoded when it is followed by zero
//! bytes, which is what the decoder reads once the input is exhausted.
//!
//! * Pas76: "Source coding algorithms for fast data compression"
//!          by Richard Clark Pasco (1976).
//!
//! * Mar79: "Range encoding: an algorithm for removing redundancy from a digitised message"
//!          by Martin, G.N.N. (1979)
#[cfg(feature = "decoder")]
pub use decoder::RangeDecoder;
#[cfg(feature = "encoder")]
pub use encoder::RangeEncoder;

#[cfg(feature = "decoder")]
mod decoder;
#[cfg(feature = "encoder")]
mod encoder;

/// The number of bits to output at a time.
const SYM_BITS: u32 = 8;
/// The total number of bits in each of the state registers.
const CODE_BITS: u32 = 32;
/// The maximum symbol value.
const SYM_MAX: u8 = u8::MAX;
/// Bits to shift by to move the high-order symbol into the low-order position.
const CODE_SHIFT: u32 = CODE_BITS - SYM_BITS;
/// Renormalize as soon as the range drops below this value.
const CODE_TOP: u32 = 1 << CODE_SHIFT;
/// The number of bytes the decoder reads on creation to fill its code window.
const CODE_BYTES: u32 = CODE_BITS / SYM_BITS;

/// Provides common bit accounting for the range encoder and decoder.
pub trait Tell {
    /// Must return the total number of whole bits shifted through the state registers.
    fn bits_total(&self) -> u64;
    /// Must return the number of values in the current range.
    fn range(&self) -> u32;

    /// Returns the number of bits "used" by the encoded or decoded symbols so far.
    ///
    /// This number is the same in the encoder and the decoder after coding the same
    /// symbols with the same tables, so it is suitable for making coding decisions.
    ///
    /// This will always be slightly larger than the exact value (e.g., all
    /// rounding error is in the positive direction).
    fn tell(&self) -> u64 {
        let range_bits = CODE_BITS - self.range().leading_zeros();
        self.bits_total() - u64::from(range_bits)
    }
}
