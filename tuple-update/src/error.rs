//! Update engine error implementation.
//!
//! Every error is local to a single operation and carries the opcode
//! character plus the user-visible field reference: the index as the client
//! supplied it (adjusted back to the configured base, negative indexes kept
//! as-is) or the path key name.

use core::fmt;
use thiserror::Error;
use tuple_mp::MpError;

/// User-visible reference to the field an operation targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    /// Field addressed by number.
    No(i32),
    /// Field addressed by name or path key.
    Name(String),
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::No(n) => write!(f, "{n}"),
            FieldRef::Name(s) => write!(f, "'{s}'"),
        }
    }
}

/// Update engine error variants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    /// The request itself is malformed: the op list or an operation is not
    /// the expected shape, or a buffer is not well-formed msgpack.
    #[error("illegal parameters, {0}")]
    IllegalParams(String),
    /// Unknown opcode, or an argument count that does not match the opcode.
    #[error("unknown UPDATE operation")]
    UnknownUpdateOp,
    /// A numeric field reference did not resolve.
    #[error("field {0} was not found in the tuple")]
    NoSuchFieldNo(i32),
    /// A field name or path key did not resolve.
    #[error("field '{0}' was not found in the tuple")]
    NoSuchFieldName(String),
    /// An operation argument, or the stored field a scalar operation reads,
    /// has the wrong msgpack type.
    #[error("argument type in operation '{opcode}' on field {field} does not match field type: expected {expected}")]
    ArgType {
        opcode: char,
        field: FieldRef,
        expected: &'static str,
    },
    /// An integer arithmetic result left `[-2^63, 2^64)`.
    #[error("integer overflow when performing '{opcode}' operation on field {field}")]
    IntegerOverflow { opcode: char, field: FieldRef },
    /// Two operations landed on the exact same leaf in one call.
    #[error("'{opcode}' on field {field}: double update of the same field")]
    DoubleUpdate { opcode: char, field: FieldRef },
    /// Path syntax error; `pos` is the 1-based byte position in the path.
    #[error("'{opcode}' on field {field}: invalid JSON path in position {pos}")]
    BadJson {
        opcode: char,
        field: FieldRef,
        pos: usize,
    },
    /// Splice offset outside the addressable range of the string.
    #[error("SPLICE error on field {field}: {reason}")]
    Splice {
        field: FieldRef,
        reason: &'static str,
    },
    /// A path token contradicts the container it addresses: a key subscript
    /// against an array, an index subscript against a map.
    #[error("'{opcode}' on field {field}: the addressed field is not {expected}")]
    BadType {
        opcode: char,
        field: FieldRef,
        expected: &'static str,
    },
    /// Remaining operation-local diagnostics (duplicate map key, map delete
    /// count, wildcard path step).
    #[error("'{opcode}' on field {field}: {reason}")]
    Field {
        opcode: char,
        field: FieldRef,
        reason: &'static str,
    },
}

impl From<MpError> for UpdateError {
    fn from(e: MpError) -> Self {
        UpdateError::IllegalParams(format!("malformed msgpack: {e}"))
    }
}
