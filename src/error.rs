//! Custom errors.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors thrown by the range encoder / decoder and the frequency tables.
#[derive(Debug, Error)]
pub enum Error {
    /// The cumulative frequency table is malformed, or a symbol can't be coded with it.
    #[error("invalid cumulative frequency table: {0}")]
    InvalidTable(&'static str),
    /// A table entry or the table total exceeds the precision of the coder.
    #[error("precision overflow: {0}")]
    PrecisionOverflow(&'static str),
    /// The coder was already closed and released its byte stream.
    #[error("the byte stream was already closed")]
    ClosedResource,
    /// Reading from or writing to the byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
