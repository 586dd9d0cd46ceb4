//! Error types for MLED core

use thiserror::Error;

/// Result type alias for MLED operations
pub type Result<T> = std::result::Result<T, Error>;

/// MLED wire-format error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer shorter than the fixed header
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Magic bytes did not match `MLED`
    #[error("invalid magic: {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// Protocol version other than 1
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Header length field disagreed with the fixed 32-byte header
    #[error("invalid hdr_len: {0}")]
    InvalidHeaderLen(u8),

    /// Declared payload extends past the end of the datagram
    #[error("truncated payload: declared {declared} bytes, {available} available")]
    TruncatedPayload { declared: u16, available: usize },

    /// Payload shorter than the minimum for its message type
    #[error("short payload for msg_type 0x{msg_type:02x}: need {needed} bytes, have {have}")]
    ShortPayload {
        msg_type: u8,
        needed: usize,
        have: usize,
    },

    /// Payload longer than a u16 length field can carry
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Caller-side construction error (rejected before anything is sent)
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}
