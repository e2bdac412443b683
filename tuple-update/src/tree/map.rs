//! Operation routing through materialized map nodes.
//!
//! A map only materializes when two operations diverge inside it; untouched
//! pairs stay raw byte runs and are decoded pair by pair at most once, when
//! a lookup scans past them.

use super::{Ctx, Field, MapItem, MapNode};
use crate::error::UpdateError;
use crate::op::{Op, OpArg, OpGroup, WILDCARD_IN_UPDATE};
use crate::path::{self, Token};
use tuple_mp::{Cursor, MpType};

pub(crate) fn apply<'a>(
    node: &mut MapNode<'a>,
    mut op: Op<'a>,
    ctx: &mut Ctx,
) -> Result<(), UpdateError> {
    let key = match op.consume_token(ctx.base)? {
        Token::Key(k) => k,
        Token::Num(_) => return Err(op.err_bad_type(ctx.base, "an array")),
        Token::Any => return Err(op.err_field(ctx.base, WILDCARD_IN_UPDATE)),
    };
    match find(node, key)? {
        Some(index) => {
            if op.is_term() {
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
                        node.items.remove(index);
                        node.len -= 1;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            field_at(node, index).apply(op, ctx)
        }
        None => {
            if op.is_term() && matches!(op.group, OpGroup::Set | OpGroup::Insert) {
                // New pairs land right after the header, like a bar's map
                // insert does.
                node.items.insert(
                    0,
                    MapItem::New {
                        key: path::unescape(key),
                        field: Field::Scalar { data: &[], op },
                    },
                );
                node.len += 1;
                Ok(())
            } else {
                Err(op.err_no_such_field(ctx.base))
            }
        }
    }
}

pub(crate) fn field_at<'s, 'a>(node: &'s mut MapNode<'a>, index: usize) -> &'s mut Field<'a> {
    match &mut node.items[index] {
        MapItem::Kv { field, .. } | MapItem::New { field, .. } => field,
        MapItem::Rest { .. } => unreachable!("find never returns a rest run"),
    }
}

/// Locate `key` among the items, splitting the untouched run that hides it.
/// Returns the item index of the matching pair.
pub(crate) fn find<'a>(
    node: &mut MapNode<'a>,
    key: &str,
) -> Result<Option<usize>, UpdateError> {
    for index in 0..node.items.len() {
        match &node.items[index] {
            MapItem::Kv { key_raw, .. } => {
                let mut cur = Cursor::new(key_raw);
                let raw = cur.decode_str()?;
                if path::key_eq(key, raw) {
                    return Ok(Some(index));
                }
            }
            MapItem::New { key: k, .. } => {
                if *k == path::unescape(key) {
                    return Ok(Some(index));
                }
            }
            MapItem::Rest { data, count } => {
                let (data, count) = (*data, *count);
                if let Some((skipped, pair_start, value_start, pair_end)) =
                    scan_run(data, count, key)?
                {
                    let mut replacement = Vec::with_capacity(3);
                    if skipped > 0 {
                        replacement.push(MapItem::Rest {
                            data: &data[..pair_start],
                            count: skipped,
                        });
                    }
                    let found_at = index + replacement.len();
                    replacement.push(MapItem::Kv {
                        key_raw: &data[pair_start..value_start],
                        field: Field::Nop {
                            data: &data[value_start..pair_end],
                            count: 1,
                        },
                    });
                    if skipped + 1 < count {
                        replacement.push(MapItem::Rest {
                            data: &data[pair_end..],
                            count: count - skipped - 1,
                        });
                    }
                    node.items.splice(index..index + 1, replacement);
                    return Ok(Some(found_at));
                }
            }
        }
    }
    Ok(None)
}

/// Scan a run of raw pairs for `key`; returns `(pairs_skipped, pair_start,
/// value_start, pair_end)` byte offsets on a hit.
fn scan_run(
    data: &[u8],
    count: u32,
    key: &str,
) -> Result<Option<(u32, usize, usize, usize)>, UpdateError> {
    let mut cur = Cursor::new(data);
    for skipped in 0..count {
        let pair_start = cur.pos();
        let matched = match cur.peek_type()? {
            MpType::Str => path::key_eq(key, cur.decode_str()?),
            _ => {
                cur.skip_value()?;
                false
            }
        };
        let value_start = cur.pos();
        cur.skip_value()?;
        if matched {
            return Ok(Some((skipped, pair_start, value_start, cur.pos())));
        }
    }
    Ok(None)
}

/// Materialize a map node over raw container bytes. Returns the node and
/// keeps every pair unread.
pub(crate) fn create<'a>(container: &'a [u8]) -> Result<MapNode<'a>, UpdateError> {
    let mut cur = Cursor::new(container);
    let len = cur.decode_map_len()?;
    let items = if len > 0 {
        vec![MapItem::Rest {
            data: &container[cur.pos()..],
            count: len,
        }]
    } else {
        Vec::new()
    };
    Ok(MapNode { len, items })
}
