use crate::decode::MpType;
use thiserror::Error;

/// Decoding error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MpError {
    /// The buffer ended inside a value.
    #[error("unexpected end of msgpack buffer")]
    Truncated,
    /// The next value is not of the requested type.
    #[error("msgpack type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type the caller asked for.
        expected: MpType,
        /// Type actually found in the buffer.
        actual: MpType,
    },
    /// The reserved type byte `0xc1` was encountered.
    #[error("reserved msgpack type byte 0xc1")]
    Reserved,
    /// An extension value does not hold a well-formed decimal.
    #[error("malformed decimal extension payload")]
    BadDecimal,
}
