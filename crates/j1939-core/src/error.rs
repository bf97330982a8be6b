//! Decode errors for diagnostic messages

use thiserror::Error;

/// Errors raised while turning a raw packet into a typed message
///
/// A decode error aborts processing of that one packet only; callers report it
/// and carry on with the rest of the exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is shorter than the minimum record size
    #[error("truncated payload for PGN {pgn}: expected {expected} bytes, got {actual}")]
    Truncated {
        pgn: u32,
        expected: usize,
        actual: usize,
    },

    /// Packet PGN does not match the requested decode type
    #[error("unexpected PGN {actual}, expected {expected}")]
    UnexpectedPgn { expected: u32, actual: u32 },

    /// No decoder is registered for this PGN
    #[error("unsupported PGN {0}")]
    UnsupportedPgn(u32),
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;
