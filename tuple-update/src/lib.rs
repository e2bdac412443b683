//! Update engine for msgpack-encoded tuples.
//!
//! A tuple is an immutable serialized array of fields. [`update`] applies an
//! ordered list of operations (set `=`, insert `!`, delete `#`, arithmetic
//! `+`/`-`, bitwise `&`/`|`/`^`, string splice `:`) and produces a new
//! tuple, bit-exact and in one pass. Operations address fields by number
//! (negative counts from the end), by name through a [`dict::FieldDictionary`],
//! or by JSON-style path reaching arbitrarily deep into nested arrays and
//! maps.
//!
//! The engine builds an update tree over the original bytes, sharing path
//! prefixes between operations and touching only the parts of the tuple the
//! operations actually reach: an untouched trailing megabyte is copied, not
//! decoded. Errors carry the opcode and the field reference as the client
//! wrote it; on error no output is produced.
//!
//! ```
//! use tuple_update::prelude::*;
//! use tuple_mp::encode::*;
//!
//! // [1, 2, 3]
//! let mut tuple = Vec::new();
//! encode_array_header(&mut tuple, 3);
//! (1..=3).for_each(|v| encode_uint(&mut tuple, v));
//! // [["+", 2, 10]]
//! let mut ops = Vec::new();
//! encode_array_header(&mut ops, 1);
//! encode_array_header(&mut ops, 3);
//! encode_str(&mut ops, b"+");
//! encode_uint(&mut ops, 2);
//! encode_uint(&mut ops, 10);
//!
//! let new = update(&tuple, &ops, IndexBase::One, &NoNames).unwrap();
//! // [1, 12, 3]
//! assert_eq!(new, vec![0x93, 0x01, 0x0c, 0x03]);
//! ```

pub mod arith;
pub mod dict;
pub mod error;
pub mod path;
pub mod update;

mod op;
mod rope;
mod tree;

pub use error::{FieldRef, UpdateError};
pub use update::{update, IndexBase};

pub mod prelude {
    pub use crate::dict::{FieldDictionary, NameMap, NoNames};
    pub use crate::error::{FieldRef, UpdateError};
    pub use crate::update::{update, IndexBase};
}
