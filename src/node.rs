/*
 * Created on Tue Jul 07 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The B+ tree node record and the per-node operations that only ever touch one node:
//! in-node insertion with insertion-sort bubbling, and the median-lift split.
//!
//! The reference engine this crate is ported from discriminated a node's role (leaf vs.
//! internal) by a self-referential `next == self` pointer trick, so that one C struct could
//! serve both purposes without a tag field. That trick buys nothing in Rust and is actively
//! hostile to the borrow checker, so [`NodeKind`] is a plain enum instead; every other layout
//! decision (fixed key/value arity, +inf sentinel for unused keys, forward-only leaf chain) is
//! unchanged.

use crate::bucket::BucketHeader;
use core::{mem, ptr::NonNull};

/// Keys per node. A non-root node always has between 1 and `ORDER` finite keys; the root may
/// be sparser. Chosen to match the reference engine's `MAX_WEIGHT`.
pub const ORDER: usize = 20;
/// Index at which a full node is split; the key at this index is lifted to the parent.
pub const SPLIT_INDEX: usize = ORDER / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

/// A leaf value slot: either a single payload, or the head of a bucket holding several
/// payloads that share one key (see [`crate::bucket`]).
pub enum Slot<P> {
    One(NonNull<P>),
    Many(NonNull<BucketHeader<P>>),
}

// Manual impls: these hold only pointers, so they're `Copy` regardless of whether `P` is,
// unlike what `#[derive(Copy)]` would infer (it would wrongly require `P: Copy`).
impl<P> Clone for Slot<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for Slot<P> {}

/// The contents of one value slot. Which variant is legal at a given index depends on the
/// owning node's `kind`: leaves only ever hold `Empty`/`Payload`, internal nodes only ever hold
/// `Empty`/`Child`.
pub enum NodeValue<P> {
    Empty,
    Child(NonNull<Node<P>>),
    Payload(Slot<P>),
}

impl<P> Clone for NodeValue<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for NodeValue<P> {}

#[repr(align(64))]
pub struct Node<P> {
    pub kind: NodeKind,
    /// number of finite keys currently stored (the node's "weight")
    pub len: u8,
    pub keys: [f32; ORDER],
    pub values: [NodeValue<P>; ORDER + 1],
    /// leaf sibling link; always `None` on internal nodes
    pub next: Option<NonNull<Node<P>>>,
}

impl<P> Node<P> {
    fn fresh(kind: NodeKind) -> NonNull<Self> {
        let node = Self {
            kind,
            len: 0,
            keys: [f32::INFINITY; ORDER],
            values: [NodeValue::Empty; ORDER + 1],
            next: None,
        };
        // UNSAFE(ballidx): Box::into_raw never returns null
        unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(node))) }
    }

    pub fn alloc_leaf() -> NonNull<Self> {
        Self::fresh(NodeKind::Leaf)
    }

    pub fn alloc_internal() -> NonNull<Self> {
        Self::fresh(NodeKind::Internal)
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    #[inline(always)]
    pub fn weight(&self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len as usize == ORDER
    }

    /// Place `value` at the slot for `key`, creating a new slot if `key` isn't already present,
    /// or overwriting (and returning) the prior slot contents otherwise. Returns the replaced
    /// value plus whether the insertion landed in the rightmost key slot (node now full).
    ///
    /// Undefined behavior is avoided here (unlike the reference's `insert_into`, which is
    /// documented as UB on a full node): callers must check [`Node::is_full`] before calling.
    fn insert_raw(&mut self, key: f32, value: NodeValue<P>) -> (NodeValue<P>, bool) {
        debug_assert!(!self.is_full(), "insert_raw called on a full node");
        let mut i = 0usize;
        while self.keys[i] != key && !self.keys[i].is_infinite() {
            i += 1;
        }
        let is_new = self.keys[i].is_infinite();
        self.keys[i] = key;
        let prior = mem::replace(&mut self.values[i + 1], value);
        if is_new {
            self.len += 1;
        }
        self.insertion_sort(i);
        (prior, i == ORDER - 1)
    }

    /// Bubble the key (and its paired value slot) placed at `idx` leftward until order is
    /// restored. Mirrors the reference engine's `insertion_sort`.
    fn insertion_sort(&mut self, mut idx: usize) {
        let original = self.keys[idx];
        while idx > 0 && self.keys[idx - 1] > original {
            self.keys[idx] = self.keys[idx - 1];
            self.keys[idx - 1] = original;
            self.values.swap(idx, idx + 1);
            idx -= 1;
        }
    }

    /// Insert a payload slot into this (leaf, non-full) node. Returns the prior slot if `key`
    /// already existed, and whether the node is now full.
    pub fn leaf_insert(&mut self, key: f32, value: Slot<P>) -> (Option<Slot<P>>, bool) {
        debug_assert!(self.is_leaf());
        let (prior, was_filled) = self.insert_raw(key, NodeValue::Payload(value));
        let prior = match prior {
            NodeValue::Empty => None,
            NodeValue::Payload(s) => Some(s),
            NodeValue::Child(_) => unreachable!("leaf slot held a child pointer"),
        };
        (prior, was_filled)
    }

    /// Set the leftmost child pointer (`values[0]`), the one slot never touched by
    /// [`Node::insert_raw`]. Only meaningful on a freshly allocated internal node, when
    /// promoting a root split.
    pub fn set_first_child(&mut self, child: NonNull<Node<P>>) {
        debug_assert!(!self.is_leaf());
        debug_assert!(matches!(self.values[0], NodeValue::Empty));
        self.values[0] = NodeValue::Child(child);
    }

    /// Insert a lifted key and its right child into this (internal, non-full) node. Returns
    /// whether the node is now full.
    pub fn internal_insert(&mut self, key: f32, child: NonNull<Node<P>>) -> bool {
        debug_assert!(!self.is_leaf());
        let (prior, was_filled) = self.insert_raw(key, NodeValue::Child(child));
        debug_assert!(
            matches!(prior, NodeValue::Empty),
            "internal node insertion hit an occupied slot; tree is corrupt"
        );
        was_filled
    }

    /// Split this full node at [`SPLIT_INDEX`], returning the lifted key and the newly
    /// allocated right sibling. `self` keeps the left half; the sibling holds the right half.
    pub fn split(&mut self) -> (f32, NonNull<Node<P>>) {
        debug_assert!(self.is_full());
        const S: usize = SPLIT_INDEX;
        let lifted = self.keys[S];
        let mut sibling = if self.is_leaf() {
            Node::alloc_leaf()
        } else {
            Node::alloc_internal()
        };
        // UNSAFE(ballidx): sibling was just allocated by this call and is not aliased
        let sib = unsafe { sibling.as_mut() };

        if self.is_leaf() {
            sib.keys[0] = lifted;
            for j in (S + 1)..ORDER {
                sib.keys[j - S] = self.keys[j];
                self.keys[j] = f32::INFINITY;
            }
            for j in (S + 1)..=ORDER {
                sib.values[j - S] = mem::replace(&mut self.values[j], NodeValue::Empty);
            }
            sib.len = (ORDER - S) as u8;
            sib.next = self.next;
            self.next = Some(sibling);
        } else {
            for j in (S + 1)..ORDER {
                sib.keys[j - S - 1] = self.keys[j];
                self.keys[j] = f32::INFINITY;
            }
            for j in (S + 1)..=ORDER {
                sib.values[j - S - 1] = mem::replace(&mut self.values[j], NodeValue::Empty);
            }
            sib.len = (ORDER - S - 1) as u8;
        }
        self.keys[S] = f32::INFINITY;
        self.len = S as u8;
        (lifted, sibling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_slot(v: u32) -> Slot<u32> {
        let boxed = Box::new(v);
        Slot::One(unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) })
    }

    unsafe fn slot_value(s: Slot<u32>) -> u32 {
        match s {
            Slot::One(p) => *Box::from_raw(p.as_ptr()),
            Slot::Many(_) => panic!("expected a bare payload"),
        }
    }

    #[test]
    fn leaf_insert_keeps_keys_sorted() {
        let mut leaf = unsafe { Box::from_raw(Node::<u32>::alloc_leaf().as_ptr()) };
        for k in [5.0f32, 1.0, 3.0, 2.0, 4.0] {
            let (prior, _) = leaf.leaf_insert(k, leaf_slot(k as u32));
            assert!(prior.is_none());
        }
        assert_eq!(leaf.weight(), 5);
        assert_eq!(&leaf.keys[..5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        for i in 5..ORDER {
            assert!(leaf.keys[i].is_infinite());
        }
    }

    #[test]
    fn leaf_insert_on_existing_key_returns_prior() {
        let mut leaf = unsafe { Box::from_raw(Node::<u32>::alloc_leaf().as_ptr()) };
        let (prior, _) = leaf.leaf_insert(2.0, leaf_slot(100));
        assert!(prior.is_none());
        let (prior, _) = leaf.leaf_insert(2.0, leaf_slot(200));
        let prior = prior.expect("key 2.0 already existed");
        assert_eq!(unsafe { slot_value(prior) }, 100);
        assert_eq!(leaf.weight(), 1);
    }

    #[test]
    fn split_leaf_preserves_all_keys_across_both_halves() {
        let mut leaf = unsafe { Box::from_raw(Node::<u32>::alloc_leaf().as_ptr()) };
        for k in 0..ORDER {
            leaf.leaf_insert(k as f32, leaf_slot(k as u32));
        }
        assert!(leaf.is_full());
        let (lifted, mut sibling) = leaf.split();
        assert_eq!(lifted, SPLIT_INDEX as f32);
        assert_eq!(leaf.weight(), SPLIT_INDEX);
        let sib = unsafe { sibling.as_mut() };
        assert_eq!(sib.weight(), ORDER - SPLIT_INDEX);
        assert_eq!(sib.keys[0], lifted);
        assert_eq!(leaf.next, Some(sibling));
        unsafe {
            drop(Box::from_raw(sibling.as_ptr()));
        }
    }
}
