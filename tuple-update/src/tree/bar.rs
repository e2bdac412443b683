//! Bar creation: a lone deep operation applied by walking raw bytes.
//!
//! When exactly one operation addresses a path inside a field, nothing is
//! materialized. The walk below follows the path token by token through the
//! original bytes, validates every step, executes the terminal operation
//! against the addressed value, and records just enough anchor geometry for
//! the serializer: the value to replace, the spot to insert at, the range
//! to cut, and the container header whose length changes. All anchors are
//! subslices of the original tuple, so a later branch can re-root the bar
//! under a deeper node for free.

use super::{BarKind, BarNode, Ctx};
use crate::error::UpdateError;
use crate::op::{Op, OpArg, OpGroup, WILDCARD_IN_UPDATE};
use crate::path::{self, Token};
use tuple_mp::{Cursor, MpType};

pub(crate) fn create<'a>(
    data: &'a [u8],
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<BarNode<'a>, UpdateError> {
    debug_assert!(!op.is_term());
    let path = op.lexer.remaining();
    let mut cur = Cursor::new(data);
    loop {
        let token = op.consume_token(ctx.base)?;
        let last = op.is_term();
        match token {
            Token::Any => return Err(op.err_field(ctx.base, WILDCARD_IN_UPDATE)),
            Token::Num(index) => {
                match cur.peek_type().map_err(UpdateError::from)? {
                    MpType::Array => {}
                    MpType::Map => return Err(op.err_bad_type(ctx.base, "an array")),
                    _ => return Err(op.err_no_such_field(ctx.base)),
                }
                let header_start = cur.pos();
                let len = cur.decode_array_len()?;
                let header = &data[header_start..cur.pos()];

                if last && op.group == OpGroup::Insert {
                    if index > len {
                        return Err(op.err_no_such_field(ctx.base));
                    }
                    for _ in 0..index {
                        cur.skip_value()?;
                    }
                    let p = cur.pos();
                    return Ok(BarNode {
                        data,
                        path,
                        op,
                        kind: BarKind::ArrayInsert {
                            header,
                            point: &data[p..p],
                            new_len: len + 1,
                        },
                    });
                }
                if last && op.group == OpGroup::Delete {
                    let OpArg::Delete { count } = op.arg else {
                        unreachable!()
                    };
                    if index as u64 + count as u64 > len as u64 {
                        return Err(op.err_no_such_field(ctx.base));
                    }
                    for _ in 0..index {
                        cur.skip_value()?;
                    }
                    let start = cur.pos();
                    for _ in 0..count {
                        cur.skip_value()?;
                    }
                    return Ok(BarNode {
                        data,
                        path,
                        op,
                        kind: BarKind::Cut {
                            header,
                            cut: &data[start..cur.pos()],
                            new_len: len - count,
                            is_map: false,
                        },
                    });
                }

                if index >= len {
                    return Err(op.err_no_such_field(ctx.base));
                }
                for _ in 0..index {
                    cur.skip_value()?;
                }
                if last {
                    let start = cur.pos();
                    cur.skip_value()?;
                    let point = &data[start..cur.pos()];
                    op.execute_scalar(point, ctx.base)?;
                    return Ok(BarNode {
                        data,
                        path,
                        op,
                        kind: BarKind::Point { point },
                    });
                }
                // Descend: the cursor already sits at the child value.
            }
            Token::Key(key) => {
                match cur.peek_type().map_err(UpdateError::from)? {
                    MpType::Map => {}
                    MpType::Array => return Err(op.err_bad_type(ctx.base, "a map")),
                    _ => return Err(op.err_no_such_field(ctx.base)),
                }
                let header_start = cur.pos();
                let len = cur.decode_map_len()?;
                let header = &data[header_start..cur.pos()];

                let mut hit: Option<(&'a [u8], &'a [u8], Cursor<'a>)> = None;
                for _ in 0..len {
                    let pair_start = cur.pos();
                    let matched = match cur.peek_type()? {
                        MpType::Str => path::key_eq(key, cur.decode_str()?),
                        _ => {
                            cur.skip_value()?;
                            false
                        }
                    };
                    let at_value = cur;
                    let value_start = cur.pos();
                    cur.skip_value()?;
                    if matched {
                        let pair = &data[pair_start..cur.pos()];
                        let value = &data[value_start..cur.pos()];
                        hit = Some((pair, value, at_value));
                        break;
                    }
                }

                let Some((pair, value, at_value)) = hit else {
                    if last && matches!(op.group, OpGroup::Set | OpGroup::Insert) {
                        // Set on a missing key inserts it, right after the
                        // map header.
                        return Ok(BarNode {
                            data,
                            path,
                            op,
                            kind: BarKind::MapInsert {
                                header,
                                key: path::unescape(key),
                                new_len: len + 1,
                            },
                        });
                    }
                    return Err(op.err_no_such_field(ctx.base));
                };

                if last {
                    match op.group {
                        OpGroup::Insert => {
                            return Err(op.err_field(ctx.base, "the key exists already"))
                        }
                        OpGroup::Delete => {
                            let OpArg::Delete { count } = op.arg else {
                                unreachable!()
                            };
                            if count != 1 {
                                return Err(op.err_field(
                                    ctx.base,
                                    "can delete only 1 field from a map in a row",
                                ));
                            }
                            return Ok(BarNode {
                                data,
                                path,
                                op,
                                kind: BarKind::Cut {
                                    header,
                                    cut: pair,
                                    new_len: len - 1,
                                    is_map: true,
                                },
                            });
                        }
                        _ => {
                            op.execute_scalar(value, ctx.base)?;
                            return Ok(BarNode {
                                data,
                                path,
                                op,
                                kind: BarKind::Point { point: value },
                            });
                        }
                    }
                }
                // Descend into the found value.
                cur = at_value;
            }
        }
    }
}
