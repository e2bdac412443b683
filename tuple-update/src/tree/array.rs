//! Operation routing through array nodes.

use super::{ArrayNode, Ctx, Field};
use crate::error::UpdateError;
use crate::op::{Op, OpArg, OpGroup, WILDCARD_IN_UPDATE};
use crate::path::Token;

/// Apply a top-level operation. The target index comes from the decoded
/// field number and may be negative, counting from the end; insert resolves
/// it against length + 1 so that `-1` appends.
pub(crate) fn apply_root<'a>(
    node: &mut ArrayNode<'a>,
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    let len = node.rope.len();
    let upper = if op.group == OpGroup::Insert && op.is_term() {
        len + 1
    } else {
        len
    };
    let index = if op.field_no >= 0 {
        op.field_no as u32
    } else {
        let resolved = op.field_no as i64 + upper as i64;
        if resolved < 0 {
            return Err(op.err_no_such_field(ctx.base));
        }
        resolved as u32
    };
    if index >= upper {
        return Err(op.err_no_such_field(ctx.base));
    }
    op.set_current_no(index as i32);
    apply_at(node, index, op, ctx)
}

/// Apply at a nested array: the index is the next path token.
pub(crate) fn apply<'a>(
    node: &mut ArrayNode<'a>,
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    let index = match op.consume_token(ctx.base)? {
        Token::Num(i) => i,
        Token::Key(_) => return Err(op.err_bad_type(ctx.base, "a map")),
        Token::Any => return Err(op.err_field(ctx.base, WILDCARD_IN_UPDATE)),
    };
    let len = node.rope.len();
    let upper = if op.group == OpGroup::Insert && op.is_term() {
        len + 1
    } else {
        len
    };
    if index >= upper {
        return Err(op.err_no_such_field(ctx.base));
    }
    apply_at(node, index, op, ctx)
}

fn apply_at<'a>(
    node: &mut ArrayNode<'a>,
    index: u32,
    op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    if op.is_term() {
        match op.group {
            OpGroup::Insert => {
                node.rope
                    .insert_at(index, Field::Scalar { data: &[], op }, &mut ctx.rng)?;
                return Ok(());
            }
            OpGroup::Delete => {
                let OpArg::Delete { count } = op.arg else {
                    unreachable!()
                };
                if index as u64 + count as u64 > node.rope.len() as u64 {
                    return Err(op.err_no_such_field(ctx.base));
                }
                node.rope.erase_range(index, count, &mut ctx.rng)?;
                return Ok(());
            }
            _ => {}
        }
    }
    let child = node.rope.get_mut(index, &mut ctx.rng)?;
    child.apply(op, ctx)
}
