//! Ordered field sequence with logarithmic split and lookup.
//!
//! An updated array keeps its children here. The structure is an implicit
//! treap: node order is the field order, heap order follows random
//! priorities, and every subtree is size-augmented so position lookup is a
//! binary descent.
//!
//! The leaves are [`Field`]s. An untouched run of consecutive original
//! fields stays a single `Nop` leaf spanning `count` fields; it is decoded
//! (just far enough to find the byte boundary) only when an operation lands
//! inside it. An array of a million fields touched at one index therefore
//! costs one leaf split, not a million decodes.

use crate::tree::Field;
use rand::rngs::SmallRng;
use rand::RngCore;
use tuple_mp::{Cursor, MpError};

pub(crate) struct Rope<'a> {
    root: Option<Box<Node<'a>>>,
}

struct Node<'a> {
    prio: u64,
    /// Logical field count of the whole subtree.
    size: u32,
    left: Option<Box<Node<'a>>>,
    right: Option<Box<Node<'a>>>,
    field: Field<'a>,
}

fn width(field: &Field<'_>) -> u32 {
    match field {
        Field::Nop { count, .. } => *count,
        _ => 1,
    }
}

fn size(node: &Option<Box<Node<'_>>>) -> u32 {
    node.as_ref().map_or(0, |n| n.size)
}

impl<'a> Node<'a> {
    fn new(field: Field<'a>, prio: u64) -> Box<Self> {
        let size = width(&field);
        Box::new(Node {
            prio,
            size,
            left: None,
            right: None,
            field,
        })
    }

    fn update(&mut self) {
        self.size = size(&self.left) + width(&self.field) + size(&self.right);
    }
}

fn merge<'a>(a: Option<Box<Node<'a>>>, b: Option<Box<Node<'a>>>) -> Option<Box<Node<'a>>> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(mut a), Some(mut b)) => {
            if a.prio >= b.prio {
                a.right = merge(a.right.take(), Some(b));
                a.update();
                Some(a)
            } else {
                b.left = merge(Some(a), b.left.take());
                b.update();
                Some(b)
            }
        }
    }
}

/// Split into subtrees holding the first `k` logical fields and the rest.
/// A cut falling inside a multi-field `Nop` leaf decodes the run up to the
/// cut point and splits the leaf in two.
fn split<'a>(
    node: Option<Box<Node<'a>>>,
    k: u32,
    rng: &mut SmallRng,
) -> Result<(Option<Box<Node<'a>>>, Option<Box<Node<'a>>>), MpError> {
    let Some(mut n) = node else {
        return Ok((None, None));
    };
    let left_size = size(&n.left);
    let w = width(&n.field);
    if k <= left_size {
        let (a, b) = split(n.left.take(), k, rng)?;
        n.left = b;
        n.update();
        Ok((a, Some(n)))
    } else if k >= left_size + w {
        let (a, b) = split(n.right.take(), k - left_size - w, rng)?;
        n.right = a;
        n.update();
        Ok((Some(n), b))
    } else {
        let off = k - left_size;
        let Node {
            prio, left, right, field, ..
        } = *n;
        let Field::Nop { data, count } = field else {
            unreachable!("only nop leaves span more than one field");
        };
        let mut cur = Cursor::new(data);
        for _ in 0..off {
            cur.skip_value()?;
        }
        let cut = cur.pos();
        let head = Field::Nop {
            data: &data[..cut],
            count: off,
        };
        let tail = Field::Nop {
            data: &data[cut..],
            count: count - off,
        };
        let a = merge(left, Some(Node::new(head, prio)));
        let b = merge(Some(Node::new(tail, rng.next_u64())), right);
        Ok((a, b))
    }
}

fn leaf_mut<'s, 'a>(node: &'s mut Node<'a>, i: u32) -> &'s mut Field<'a> {
    let left_size = size(&node.left);
    let w = width(&node.field);
    if i < left_size {
        let Some(left) = node.left.as_mut() else {
            unreachable!()
        };
        leaf_mut(left, i)
    } else if i < left_size + w {
        &mut node.field
    } else {
        let Some(right) = node.right.as_mut() else {
            unreachable!()
        };
        leaf_mut(right, i - left_size - w)
    }
}

impl<'a> Rope<'a> {
    /// Rope over `count` consecutive original fields, stored lazily as a
    /// single leaf.
    pub fn from_nop(data: &'a [u8], count: u32, rng: &mut SmallRng) -> Self {
        let root = if count == 0 {
            None
        } else {
            Some(Node::new(Field::Nop { data, count }, rng.next_u64()))
        };
        Rope { root }
    }

    pub fn len(&self) -> u32 {
        size(&self.root)
    }

    /// Insert `field` so that it becomes the `i`-th logical field.
    /// `i` must not exceed the current length.
    pub fn insert_at(
        &mut self,
        i: u32,
        field: Field<'a>,
        rng: &mut SmallRng,
    ) -> Result<(), MpError> {
        debug_assert!(i <= self.len());
        let (a, b) = split(self.root.take(), i, rng)?;
        self.root = merge(merge(a, Some(Node::new(field, rng.next_u64()))), b);
        Ok(())
    }

    /// Remove `n` consecutive logical fields starting at `i`. The range
    /// must be in bounds.
    pub fn erase_range(&mut self, i: u32, n: u32, rng: &mut SmallRng) -> Result<(), MpError> {
        debug_assert!(i as u64 + n as u64 <= self.len() as u64);
        let (a, rest) = split(self.root.take(), i, rng)?;
        let (_, b) = split(rest, n, rng)?;
        self.root = merge(a, b);
        Ok(())
    }

    /// Isolate the `i`-th logical field into its own leaf and return it.
    /// `i` must be in bounds.
    pub fn get_mut(&mut self, i: u32, rng: &mut SmallRng) -> Result<&mut Field<'a>, MpError> {
        debug_assert!(i < self.len());
        let (a, rest) = split(self.root.take(), i, rng)?;
        let (mid, b) = split(rest, 1, rng)?;
        self.root = merge(a, merge(mid, b));
        let Some(root) = self.root.as_mut() else {
            unreachable!()
        };
        Ok(leaf_mut(root, i))
    }

    /// In-order visit of the leaves.
    pub fn visit<'s, F: FnMut(&'s Field<'a>)>(&'s self, f: &mut F) {
        fn go<'s, 'a, F: FnMut(&'s Field<'a>)>(node: &'s Option<Box<Node<'a>>>, f: &mut F) {
            if let Some(n) = node {
                go(&n.left, f);
                f(&n.field);
                go(&n.right, f);
            }
        }
        go(&self.root, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tuple_mp::encode::encode_uint;

    fn run_of(values: &[u64]) -> Vec<u8> {
        let mut buf = Vec::new();
        for &v in values {
            encode_uint(&mut buf, v);
        }
        buf
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    fn leaves(rope: &Rope<'_>) -> Vec<(usize, u32)> {
        let mut out = Vec::new();
        rope.visit(&mut |f| {
            let Field::Nop { data, count } = f else {
                panic!("expected nop leaves")
            };
            out.push((data.len(), *count));
        });
        out
    }

    #[test]
    fn lazy_until_touched() {
        let data = run_of(&[1, 2, 3, 4, 5]);
        let mut rng = rng();
        let mut rope = Rope::from_nop(&data, 5, &mut rng);
        assert_eq!(rope.len(), 5);
        assert_eq!(leaves(&rope), vec![(5, 5)]);

        let field = rope.get_mut(2, &mut rng).unwrap();
        let Field::Nop { data, count } = field else {
            panic!()
        };
        assert_eq!((*count, *data), (1, &run_of(&[3])[..]));
        // One touch produced exactly three leaves.
        assert_eq!(leaves(&rope), vec![(2, 2), (1, 1), (2, 2)]);
    }

    #[test]
    fn insert_and_erase_keep_order() {
        let data = run_of(&[1, 2, 3]);
        let extra = run_of(&[9]);
        let mut rng = rng();
        let mut rope = Rope::from_nop(&data, 3, &mut rng);
        rope.insert_at(
            1,
            Field::Nop {
                data: &extra,
                count: 1,
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(rope.len(), 4);
        let mut bytes = Vec::new();
        rope.visit(&mut |f| {
            let Field::Nop { data, .. } = f else { panic!() };
            bytes.extend_from_slice(data);
        });
        assert_eq!(bytes, run_of(&[1, 9, 2, 3]));

        rope.erase_range(1, 2, &mut rng).unwrap();
        let mut bytes = Vec::new();
        rope.visit(&mut |f| {
            let Field::Nop { data, .. } = f else { panic!() };
            bytes.extend_from_slice(data);
        });
        assert_eq!(bytes, run_of(&[1, 3]));
    }

    #[test]
    fn erase_across_run_boundaries() {
        let data = run_of(&[1, 2, 3, 4, 5, 6]);
        let mut rng = rng();
        let mut rope = Rope::from_nop(&data, 6, &mut rng);
        // Touch two positions to fragment the run, then erase across the
        // fragments.
        rope.get_mut(1, &mut rng).unwrap();
        rope.get_mut(4, &mut rng).unwrap();
        rope.erase_range(1, 4, &mut rng).unwrap();
        assert_eq!(rope.len(), 2);
        let mut bytes = Vec::new();
        rope.visit(&mut |f| {
            let Field::Nop { data, .. } = f else { panic!() };
            bytes.extend_from_slice(data);
        });
        assert_eq!(bytes, run_of(&[1, 6]));
    }

    #[test]
    fn empty_rope() {
        let mut rng = rng();
        let mut rope = Rope::from_nop(&[], 0, &mut rng);
        assert_eq!(rope.len(), 0);
        rope.insert_at(
            0,
            Field::Nop {
                data: &[0x01],
                count: 1,
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(rope.len(), 1);
    }
}
