//! The update entry point.
//!
//! `update` is a pure function from a tuple and an operation list to a new
//! tuple: it either emits a complete new byte sequence or fails with an
//! error local to one operation, never both. Intermediate state lives in an
//! update tree that borrows both input buffers and is dropped on return.

use crate::dict::FieldDictionary;
use crate::error::UpdateError;
use crate::op::Op;
use crate::rope::Rope;
use crate::tree::{array, ArrayNode, Ctx, Field};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::trace;
use tuple_mp::{Cursor, MpType};

/// Client index origin for field numbers and path subscripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    Zero,
    #[default]
    One,
}

impl IndexBase {
    fn offset(self) -> i32 {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Hard cap on operations per call; a caller wanting more splits the call.
const OP_COUNT_MAX: u32 = 4000;

/// Treap priorities only shape the tree, never the output, so a fixed seed
/// keeps the whole engine deterministic.
const ROPE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Apply `ops` (a msgpack array of operations) to `record` (a msgpack
/// array of fields) and return the new record.
///
/// Both buffers are only borrowed; the output never aliases them. On any
/// error nothing is produced; there are no partial updates.
pub fn update<D: FieldDictionary>(
    record: &[u8],
    ops: &[u8],
    index_base: IndexBase,
    dict: &D,
) -> Result<Vec<u8>, UpdateError> {
    let base = index_base.offset();
    let mut ctx = Ctx {
        base,
        rng: SmallRng::seed_from_u64(ROPE_SEED),
    };

    let mut rec = Cursor::new(record);
    if rec.peek_type()? != MpType::Array {
        return Err(UpdateError::IllegalParams("tuple must be an array".into()));
    }
    let field_count = rec.decode_array_len()?;
    let mut root = ArrayNode {
        rope: Rope::from_nop(rec.rest(), field_count, &mut ctx.rng),
    };

    let mut expr = Cursor::new(ops);
    if expr.peek_type()? != MpType::Array {
        return Err(UpdateError::IllegalParams(
            "update operations must be an array of operations".into(),
        ));
    }
    let op_count = expr.decode_array_len()?;
    if op_count > OP_COUNT_MAX {
        return Err(UpdateError::IllegalParams(
            "too many operations for update".into(),
        ));
    }
    for _ in 0..op_count {
        let op = Op::decode(&mut expr, base, dict)?;
        trace!(opcode = %op.opcode, field = %op.field_ref(base), "applying update operation");
        array::apply_root(&mut root, op, &mut ctx)?;
    }
    if !expr.is_empty() {
        return Err(UpdateError::IllegalParams(
            "unexpected data after the last update operation".into(),
        ));
    }

    let root = Field::Array(root);
    let size = root.sizeof();
    let mut out = Vec::with_capacity(size);
    root.store(&mut out);
    debug_assert_eq!(out.len(), size);
    Ok(out)
}
