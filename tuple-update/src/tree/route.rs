//! Shared path prefixes and branching.
//!
//! A route collapses the common prefix of every operation in its subtree.
//! When a new operation walks in, either the whole prefix matches and the
//! op continues into the subtree, or the prefix splits at the divergence
//! point: the container there is materialized, the existing subtree is
//! grafted under its disambiguating token, and the new op descends the
//! container like any other. Bars branch the same way, which is how the
//! tree grows beyond a single deep op per field.

use super::{map, ArrayNode, BarKind, Ctx, Field, MapItem, RouteNode};
use crate::error::UpdateError;
use crate::op::{Op, OpArg, OpGroup};
use crate::path::{self, Lexer, Token};
use crate::rope::Rope;
use tuple_mp::{Cursor, MpType};

/// Outcome of walking an op's path against a stored path.
enum Walk<'a> {
    /// The stored path is a strict prefix of the op's path; the op's lexer
    /// is left right behind it.
    Through,
    /// The op's path ended first, or both ended together.
    Conflict,
    /// First difference: `prefix_end`/`token_end` delimit the stored path's
    /// divergent token, the op's lexer is rewound to just before its own.
    Split {
        prefix_end: usize,
        token_end: usize,
        old_token: Token<'a>,
    },
}

fn walk_common<'a>(
    op: &mut Op<'a>,
    stored: &'a str,
    base: i32,
) -> Result<Walk<'a>, UpdateError> {
    let mut stored_lexer = Lexer::new(stored, base);
    loop {
        let stored_token = stored_lexer.next_token().map_err(|pos| UpdateError::BadJson {
            opcode: op.opcode,
            field: op.field_ref(base),
            pos,
        })?;
        let Some((stored_token, start)) = stored_token else {
            return Ok(if op.is_term() {
                Walk::Conflict
            } else {
                Walk::Through
            });
        };
        if op.is_term() {
            return Ok(Walk::Conflict);
        }
        let save_lexer = op.lexer;
        let save_current = op.current;
        let token = op.consume_token(base)?;
        if path::tokens_eq(&stored_token, &token) {
            continue;
        }
        op.lexer = save_lexer;
        op.current = save_current;
        return Ok(Walk::Split {
            prefix_end: start,
            token_end: stored_lexer.pos(),
            old_token: stored_token,
        });
    }
}

/// Apply an op to a route node, splitting the prefix if needed.
pub(crate) fn apply<'a>(
    field: &mut Field<'a>,
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    let Field::Route(route) = &mut *field else {
        unreachable!()
    };
    match walk_common(&mut op, route.path, ctx.base)? {
        Walk::Through => route.next.apply(op, ctx),
        Walk::Conflict => Err(op.err_double(ctx.base)),
        Walk::Split {
            prefix_end,
            token_end,
            old_token,
        } => {
            let placeholder = Field::Nop { data: &[], count: 0 };
            let Field::Route(route) = core::mem::replace(field, placeholder) else {
                unreachable!()
            };
            let common = &route.path[..prefix_end];
            let rest = &route.path[token_end..];
            let (hop, mut container) = materialize(route.data, common, ctx)?;
            graft(
                &mut container,
                old_token,
                OldSubtree::Route {
                    rest,
                    hop: route.hop,
                    next: route.next,
                },
                ctx,
            )?;
            container.apply(op, ctx)?;
            *field = wrap(route.data, common, hop, container);
            Ok(())
        }
    }
}

/// Apply an op to a bar node by splitting it into a route over a
/// materialized container.
pub(crate) fn branch<'a>(
    field: &mut Field<'a>,
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    let Field::Bar(node) = &mut *field else {
        unreachable!()
    };
    match walk_common(&mut op, node.path, ctx.base)? {
        // Identical paths, or one a prefix of the other: the ops overlap.
        Walk::Through | Walk::Conflict => Err(op.err_double(ctx.base)),
        Walk::Split {
            prefix_end,
            token_end,
            old_token,
        } => {
            let placeholder = Field::Nop { data: &[], count: 0 };
            let Field::Bar(node) = core::mem::replace(field, placeholder) else {
                unreachable!()
            };
            let common = &node.path[..prefix_end];
            let rest = &node.path[token_end..];
            let (hop, mut container) = materialize(node.data, common, ctx)?;
            graft(
                &mut container,
                old_token,
                OldSubtree::Bar {
                    op: node.op,
                    kind: node.kind,
                    rest,
                },
                ctx,
            )?;
            container.apply(op, ctx)?;
            *field = wrap(node.data, common, hop, container);
            Ok(())
        }
    }
}

fn wrap<'a>(
    data: &'a [u8],
    common: &'a str,
    hop: &'a [u8],
    container: Field<'a>,
) -> Field<'a> {
    if common.is_empty() {
        container
    } else {
        Field::Route(RouteNode {
            data,
            path: common,
            hop,
            next: Box::new(container),
        })
    }
}

/// Walk `common` through raw bytes and build the container node at its end.
/// Every step was validated when the original operation descended here.
fn materialize<'a>(
    data: &'a [u8],
    common: &'a str,
    ctx: &mut Ctx,
) -> Result<(&'a [u8], Field<'a>), UpdateError> {
    let mut value = data;
    let mut lexer = Lexer::new(common, ctx.base);
    loop {
        match lexer.next_token() {
            Ok(Some((token, _))) => value = step(value, token)?,
            Ok(None) => break,
            Err(_) => unreachable!("stored prefixes are already lexed"),
        }
    }
    let mut cur = Cursor::new(value);
    let node = match cur.peek_type()? {
        MpType::Array => {
            let len = cur.decode_array_len()?;
            Field::Array(ArrayNode {
                rope: Rope::from_nop(&value[cur.pos()..], len, &mut ctx.rng),
            })
        }
        MpType::Map => Field::Map(map::create(value)?),
        _ => unreachable!("the divergence point was validated as a container"),
    };
    Ok((value, node))
}

fn step<'a>(value: &'a [u8], token: Token<'a>) -> Result<&'a [u8], UpdateError> {
    let mut cur = Cursor::new(value);
    match token {
        Token::Num(index) => {
            cur.decode_array_len()?;
            for _ in 0..index {
                cur.skip_value()?;
            }
            let start = cur.pos();
            cur.skip_value()?;
            Ok(&value[start..cur.pos()])
        }
        Token::Key(key) => {
            let len = cur.decode_map_len()?;
            for _ in 0..len {
                let matched = match cur.peek_type()? {
                    MpType::Str => path::key_eq(key, cur.decode_str()?),
                    _ => {
                        cur.skip_value()?;
                        false
                    }
                };
                let start = cur.pos();
                cur.skip_value()?;
                if matched {
                    return Ok(&value[start..cur.pos()]);
                }
            }
            unreachable!("the common prefix addresses an existing key")
        }
        Token::Any => unreachable!("wildcards never reach a stored path"),
    }
}

/// The subtree displaced by a split, to be re-rooted under the container at
/// the divergence point.
enum OldSubtree<'a> {
    Bar {
        op: Op<'a>,
        kind: BarKind<'a>,
        rest: &'a str,
    },
    Route {
        rest: &'a str,
        hop: &'a [u8],
        next: Box<Field<'a>>,
    },
}

/// Place the displaced subtree under `token` inside the fresh container.
/// A displaced bar whose path is spent grafts as its executed terminal op;
/// nothing is ever re-executed.
fn graft<'a>(
    container: &mut Field<'a>,
    token: Token<'a>,
    old: OldSubtree<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    match (container, token) {
        (Field::Array(node), Token::Num(index)) => match old {
            OldSubtree::Bar { op, kind, rest } => {
                if rest.is_empty() {
                    match op.group {
                        OpGroup::Insert => {
                            node.rope.insert_at(
                                index,
                                Field::Scalar { data: &[], op },
                                &mut ctx.rng,
                            )?;
                        }
                        OpGroup::Delete => {
                            let OpArg::Delete { count } = op.arg else {
                                unreachable!()
                            };
                            node.rope.erase_range(index, count, &mut ctx.rng)?;
                        }
                        _ => {
                            let slot = node.rope.get_mut(index, &mut ctx.rng)?;
                            let data = match &*slot {
                                Field::Nop { data, .. } => *data,
                                _ => unreachable!(),
                            };
                            *slot = Field::Scalar { data, op };
                        }
                    }
                } else {
                    let slot = node.rope.get_mut(index, &mut ctx.rng)?;
                    let data = match &*slot {
                        Field::Nop { data, .. } => *data,
                        _ => unreachable!(),
                    };
                    *slot = Field::Bar(super::BarNode {
                        data,
                        path: rest,
                        op,
                        kind,
                    });
                }
                Ok(())
            }
            OldSubtree::Route { rest, hop, next } => {
                let slot = node.rope.get_mut(index, &mut ctx.rng)?;
                let data = match &*slot {
                    Field::Nop { data, .. } => *data,
                    _ => unreachable!(),
                };
                *slot = if rest.is_empty() {
                    *next
                } else {
                    Field::Route(RouteNode {
                        data,
                        path: rest,
                        hop,
                        next,
                    })
                };
                Ok(())
            }
        },
        (Field::Map(node), Token::Key(key)) => match old {
            OldSubtree::Bar { op, kind, rest } if rest.is_empty() => {
                match op.group {
                    OpGroup::Insert | OpGroup::Set
                        if matches!(kind, BarKind::MapInsert { .. }) =>
                    {
                        let BarKind::MapInsert { key, .. } = kind else {
                            unreachable!()
                        };
                        node.items.insert(
                            0,
                            MapItem::New {
                                key,
                                field: Field::Scalar { data: &[], op },
                            },
                        );
                        node.len += 1;
                    }
                    OpGroup::Delete => {
                        let Some(index) = map::find(node, key)? else {
                            unreachable!()
                        };
                        node.items.remove(index);
                        node.len -= 1;
                    }
                    _ => {
                        let Some(index) = map::find(node, key)? else {
                            unreachable!()
                        };
                        let slot = map::field_at(node, index);
                        let data = match &*slot {
                            Field::Nop { data, .. } => *data,
                            _ => unreachable!(),
                        };
                        *slot = Field::Scalar { data, op };
                    }
                }
                Ok(())
            }
            OldSubtree::Bar { op, kind, rest } => {
                let Some(index) = map::find(node, key)? else {
                    unreachable!()
                };
                let slot = map::field_at(node, index);
                let data = match &*slot {
                    Field::Nop { data, .. } => *data,
                    _ => unreachable!(),
                };
                *slot = Field::Bar(super::BarNode {
                    data,
                    path: rest,
                    op,
                    kind,
                });
                Ok(())
            }
            OldSubtree::Route { rest, hop, next } => {
                let Some(index) = map::find(node, key)? else {
                    unreachable!()
                };
                let slot = map::field_at(node, index);
                let data = match &*slot {
                    Field::Nop { data, .. } => *data,
                    _ => unreachable!(),
                };
                *slot = if rest.is_empty() {
                    *next
                } else {
                    Field::Route(RouteNode {
                        data,
                        path: rest,
                        hop,
                        next,
                    })
                };
                Ok(())
            }
        },
        _ => unreachable!("container kind always matches the displaced token"),
    }
}
