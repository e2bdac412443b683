//! Zero-copy MessagePack primitives for the tuple update engine.
//!
//! The crate splits into a read side and a write side. [`Cursor`] walks a
//! borrowed buffer value by value: it can classify the next value, skip it
//! without materializing anything, or decode it into a native type. The
//! [`encode`] module holds the matching `sizeof_*`/`encode_*` free functions,
//! which always emit the canonical (shortest) representation.
//!
//! Arbitrary-precision decimals travel as extension values (tag
//! [`decimal::DECIMAL_EXT_TAG`]) carrying a scale and packed BCD digits; the
//! [`decimal`] module converts them to and from [`bigdecimal::BigDecimal`].

pub mod decimal;
pub mod decode;
pub mod encode;
mod error;

pub use decode::{Cursor, MpType};
pub use error::MpError;
