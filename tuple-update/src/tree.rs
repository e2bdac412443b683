//! The update tree.
//!
//! A tuple being updated is represented as a tree of [`Field`] nodes rooted
//! at the top-level array. Nodes start as `Nop` slices of the original
//! tuple and are specialized as operations descend: a scalar op turns its
//! leaf into `Scalar`, a deep lone op becomes a `Bar` that keeps its path
//! unmaterialized, a second op sharing a path prefix forces the prefix into
//! a `Route` over a materialized `Array` or `Map` container. Specialization
//! only ever moves forward; the tree is serialized once and discarded.
//!
//! Each submodule owns one node kind's operation routing; this module owns
//! the node type itself, the dispatch, and the two serializer passes.

pub(crate) mod array;
pub(crate) mod bar;
pub(crate) mod map;
pub(crate) mod route;

use crate::error::UpdateError;
use crate::op::Op;
use crate::rope::Rope;
use rand::rngs::SmallRng;
use std::borrow::Cow;
use tuple_mp::encode::{
    encode_array_header, encode_map_header, encode_str, sizeof_array, sizeof_map, sizeof_str,
};

/// Per-call state threaded through the descent.
pub(crate) struct Ctx {
    /// Client index origin, 0 or 1.
    pub base: i32,
    /// Priority source for rope nodes.
    pub rng: SmallRng,
}

/// A node of the update tree.
pub(crate) enum Field<'a> {
    /// Untouched bytes covering `count` consecutive fields.
    Nop { data: &'a [u8], count: u32 },
    /// A field replaced by one terminal operation. `data` is the original
    /// field (empty for inserted fields).
    Scalar { data: &'a [u8], op: Op<'a> },
    /// An array with updated children.
    Array(ArrayNode<'a>),
    /// A map with updated children.
    Map(MapNode<'a>),
    /// A single operation deep inside this field, path kept as-is.
    Bar(BarNode<'a>),
    /// Common path prefix shared by every operation in the subtree below.
    Route(RouteNode<'a>),
}

pub(crate) struct ArrayNode<'a> {
    pub rope: Rope<'a>,
}

pub(crate) struct MapNode<'a> {
    /// Current pair count, inserts and deletes applied.
    pub len: u32,
    pub items: Vec<MapItem<'a>>,
}

pub(crate) enum MapItem<'a> {
    /// A run of untouched key/value pairs.
    Rest { data: &'a [u8], count: u32 },
    /// A pair whose value is being updated; `key_raw` is the encoded key.
    Kv {
        key_raw: &'a [u8],
        field: Field<'a>,
    },
    /// A freshly inserted pair.
    New {
        key: Cow<'a, str>,
        field: Field<'a>,
    },
}

pub(crate) struct BarNode<'a> {
    /// The whole field this bar covers.
    pub data: &'a [u8],
    /// Remaining path from this field down to the anchor. Never empty.
    pub path: &'a str,
    pub op: Op<'a>,
    pub kind: BarKind<'a>,
}

/// Where a bar's operation lands inside the covered bytes. All slices point
/// into the original tuple, so a bar can be re-rooted to a child field
/// without recomputing anything.
pub(crate) enum BarKind<'a> {
    /// Replace `point` with the operation result.
    Point { point: &'a [u8] },
    /// Insert the new value at `point` (an empty slice marking the spot)
    /// inside the array whose header is `header`.
    ArrayInsert {
        header: &'a [u8],
        point: &'a [u8],
        new_len: u32,
    },
    /// Remove `cut` from the container whose header is `header`.
    Cut {
        header: &'a [u8],
        cut: &'a [u8],
        new_len: u32,
        is_map: bool,
    },
    /// Insert a new pair right after the map header.
    MapInsert {
        header: &'a [u8],
        key: Cow<'a, str>,
        new_len: u32,
    },
}

pub(crate) struct RouteNode<'a> {
    /// The whole field this route covers.
    pub data: &'a [u8],
    /// Shared path prefix. Never empty.
    pub path: &'a str,
    /// Bytes of the container at the end of the prefix.
    pub hop: &'a [u8],
    pub next: Box<Field<'a>>,
}

/// Byte offset of a subslice within the slice that contains it.
pub(crate) fn offset_in(base: &[u8], sub: &[u8]) -> usize {
    sub.as_ptr() as usize - base.as_ptr() as usize
}

impl<'a> Field<'a> {
    /// Route one operation into this node.
    pub fn apply(&mut self, op: Op<'a>, ctx: &mut Ctx) -> Result<(), UpdateError> {
        match &mut *self {
            Field::Nop { .. } => self.apply_nop(op, ctx),
            // A leaf already has its one terminal op; a node with children
            // cannot also be replaced wholesale.
            Field::Scalar { .. } => Err(op.err_double(ctx.base)),
            _ if op.is_term() => Err(op.err_double(ctx.base)),
            Field::Array(node) => array::apply(node, op, ctx),
            Field::Map(node) => map::apply(node, op, ctx),
            Field::Bar(_) => route::branch(self, op, ctx),
            Field::Route(_) => route::apply(self, op, ctx),
        }
    }

    fn apply_nop(&mut self, mut op: Op<'a>, ctx: &mut Ctx) -> Result<(), UpdateError> {
        let data = match &*self {
            Field::Nop { data, count } => {
                debug_assert_eq!(*count, 1);
                *data
            }
            _ => unreachable!(),
        };
        if op.is_term() {
            op.execute_scalar(data, ctx.base)?;
            *self = Field::Scalar { data, op };
            Ok(())
        } else {
            // The key optimization: a lone deep op never decodes the
            // containers it passes through.
            let bar = bar::create(data, op, ctx)?;
            *self = Field::Bar(bar);
            Ok(())
        }
    }

    /// Exact encoded size of this subtree.
    pub fn sizeof(&self) -> usize {
        match self {
            Field::Nop { data, .. } => data.len(),
            Field::Scalar { op, .. } => op.new_field_len as usize,
            Field::Array(node) => {
                let mut total = sizeof_array(node.rope.len()) as usize;
                node.rope.visit(&mut |f| total += f.sizeof());
                total
            }
            Field::Map(node) => node.sizeof(),
            Field::Bar(node) => node.sizeof(),
            Field::Route(node) => {
                node.data.len() - node.hop.len() + node.next.sizeof()
            }
        }
    }

    /// Emit this subtree.
    pub fn store(&self, out: &mut Vec<u8>) {
        match self {
            Field::Nop { data, .. } => out.extend_from_slice(data),
            Field::Scalar { op, .. } => op.store_scalar(out),
            Field::Array(node) => {
                encode_array_header(out, node.rope.len());
                node.rope.visit(&mut |f| f.store(out));
            }
            Field::Map(node) => node.store(out),
            Field::Bar(node) => node.store(out),
            Field::Route(node) => {
                let off = offset_in(node.data, node.hop);
                out.extend_from_slice(&node.data[..off]);
                node.next.store(out);
                out.extend_from_slice(&node.data[off + node.hop.len()..]);
            }
        }
    }
}

impl<'a> MapNode<'a> {
    fn sizeof(&self) -> usize {
        let mut total = sizeof_map(self.len) as usize;
        for item in &self.items {
            total += match item {
                MapItem::Rest { data, .. } => data.len(),
                MapItem::Kv { key_raw, field } => key_raw.len() + field.sizeof(),
                MapItem::New { key, field } => {
                    sizeof_str(key.len() as u32) as usize + field.sizeof()
                }
            };
        }
        total
    }

    fn store(&self, out: &mut Vec<u8>) {
        encode_map_header(out, self.len);
        for item in &self.items {
            match item {
                MapItem::Rest { data, .. } => out.extend_from_slice(data),
                MapItem::Kv { key_raw, field } => {
                    out.extend_from_slice(key_raw);
                    field.store(out);
                }
                MapItem::New { key, field } => {
                    encode_str(out, key.as_bytes());
                    field.store(out);
                }
            }
        }
    }
}

impl<'a> BarNode<'a> {
    fn sizeof(&self) -> usize {
        let value_len = self.op.new_field_len as usize;
        match &self.kind {
            BarKind::Point { point } => self.data.len() - point.len() + value_len,
            BarKind::ArrayInsert {
                header, new_len, ..
            } => self.data.len() - header.len() + sizeof_array(*new_len) as usize + value_len,
            BarKind::Cut {
                header,
                cut,
                new_len,
                is_map,
            } => {
                let header_len = if *is_map {
                    sizeof_map(*new_len)
                } else {
                    sizeof_array(*new_len)
                };
                self.data.len() - header.len() + header_len as usize - cut.len()
            }
            BarKind::MapInsert {
                header,
                key,
                new_len,
            } => {
                self.data.len() - header.len()
                    + sizeof_map(*new_len) as usize
                    + sizeof_str(key.len() as u32) as usize
                    + value_len
            }
        }
    }

    fn store(&self, out: &mut Vec<u8>) {
        let data = self.data;
        match &self.kind {
            BarKind::Point { point } => {
                let off = offset_in(data, point);
                out.extend_from_slice(&data[..off]);
                self.op.store_scalar(out);
                out.extend_from_slice(&data[off + point.len()..]);
            }
            BarKind::ArrayInsert {
                header,
                point,
                new_len,
            } => {
                let hoff = offset_in(data, header);
                let poff = offset_in(data, point);
                out.extend_from_slice(&data[..hoff]);
                encode_array_header(out, *new_len);
                out.extend_from_slice(&data[hoff + header.len()..poff]);
                self.op.store_scalar(out);
                out.extend_from_slice(&data[poff..]);
            }
            BarKind::Cut {
                header,
                cut,
                new_len,
                is_map,
            } => {
                let hoff = offset_in(data, header);
                let coff = offset_in(data, cut);
                out.extend_from_slice(&data[..hoff]);
                if *is_map {
                    encode_map_header(out, *new_len);
                } else {
                    encode_array_header(out, *new_len);
                }
                out.extend_from_slice(&data[hoff + header.len()..coff]);
                out.extend_from_slice(&data[coff + cut.len()..]);
            }
            BarKind::MapInsert {
                header,
                key,
                new_len,
            } => {
                let hoff = offset_in(data, header);
                out.extend_from_slice(&data[..hoff]);
                encode_map_header(out, *new_len);
                encode_str(out, key.as_bytes());
                self.op.store_scalar(out);
                out.extend_from_slice(&data[hoff + header.len()..]);
            }
        }
    }
}
