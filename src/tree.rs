/*
 * Created on Thu Jul 09 2026
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

//! The tree façade: root management, descent, recursive insert with promotion, range search,
//! and the two debug invariant probes.

use crate::{
    bucket::BucketHeader,
    error::{Error, IndexResult},
    iter::{BatchEntry, IterationBuffer},
    node::{Node, NodeValue, Slot},
};
use core::ptr::NonNull;

/// An in-memory ordered multi-map from `f32` keys to caller-owned payloads, organized as a B+
/// tree with a forward-linked leaf chain for batched range scans.
///
/// `Tree` never reads or writes through a payload pointer; it only stores and hands them back.
/// Payloads must outlive their residency in the tree.
pub struct Tree<P> {
    root: NonNull<Node<P>>,
}

/// First index `i` such that `n.keys[i] > key` (equivalently, the first index *not* `<= key`),
/// i.e. the child/value slot to descend into. Matches the reference engine's descent loop
/// (`while (curr->keys[i] <= kxchg) i++`); the `i < ORDER` guard is a defensive bound that the
/// node-fill invariant (§ split always leaves at least one `+inf` sentinel) never actually
/// triggers.
fn child_index<P>(n: &Node<P>, key: f32) -> usize {
    let mut i = 0;
    while i < crate::node::ORDER && n.keys[i] <= key {
        i += 1;
    }
    i
}

impl<P> Tree<P> {
    pub fn new() -> Self {
        Self {
            root: Node::alloc_leaf(),
        }
    }

    fn find_leaf(&self, key: f32) -> NonNull<Node<P>> {
        let mut cur = self.root;
        loop {
            // UNSAFE(ballidx): every node reachable from `self.root` is live for the tree's
            // lifetime; `&self` guarantees no concurrent mutation
            let n = unsafe { cur.as_ref() };
            if n.is_leaf() {
                return cur;
            }
            let i = child_index(n, key);
            cur = match n.values[i] {
                NodeValue::Child(c) => c,
                _ => panic!("corrupt internal node: missing child pointer on live prefix"),
            };
        }
    }

    /// Descend-and-insert. Returns the slot that previously occupied `key`, if any, so the
    /// caller (only [`Tree::insert`]) can decide whether to promote it into a bucket.
    fn replace(&mut self, key: f32, slot: Slot<P>) -> Option<Slot<P>> {
        let (prior, split) = self.insert_rec(self.root, key, slot);
        if let Some((sep, right)) = split {
            log::debug!("root split on lifted key {sep}");
            let mut new_root = Node::alloc_internal();
            // UNSAFE(ballidx): new_root was just allocated by this call and is unaliased
            let nr = unsafe { new_root.as_mut() };
            nr.set_first_child(self.root);
            nr.internal_insert(sep, right);
            self.root = new_root;
        }
        prior
    }

    fn insert_rec(
        &mut self,
        mut node: NonNull<Node<P>>,
        key: f32,
        slot: Slot<P>,
    ) -> (Option<Slot<P>>, Option<(f32, NonNull<Node<P>>)>) {
        // UNSAFE(ballidx): `node` is reachable from `self.root`; `&mut self` guarantees
        // exclusive access for the duration of this call tree
        let n = unsafe { node.as_mut() };
        if n.is_leaf() {
            let (prior, was_filled) = n.leaf_insert(key, slot);
            let split = if was_filled {
                log::trace!("leaf full after insert, splitting");
                Some(n.split())
            } else {
                None
            };
            (prior, split)
        } else {
            let i = child_index(n, key);
            let child = match n.values[i] {
                NodeValue::Child(c) => c,
                _ => panic!("corrupt internal node: missing child pointer on live prefix"),
            };
            let (prior, child_split) = self.insert_rec(child, key, slot);
            let split = match child_split {
                None => None,
                Some((sep, right)) => {
                    // UNSAFE(ballidx): re-borrow `node`; the recursive call above only
                    // touched nodes below it in the tree, never `node` itself
                    let n = unsafe { node.as_mut() };
                    if n.internal_insert(sep, right) {
                        log::trace!("internal node full after promotion, splitting");
                        Some(n.split())
                    } else {
                        None
                    }
                }
            };
            (prior, split)
        }
    }

    /// Insert `payload` under `key`. If `key` already holds one or more payloads, `payload`
    /// joins them in a bucket rather than replacing anything.
    pub fn insert(&mut self, key: f32, payload: NonNull<P>) -> IndexResult<()> {
        if !key.is_finite() {
            return Err(Error::BadKey);
        }
        match self.replace(key, Slot::One(payload)) {
            None => {}
            Some(Slot::Many(mut header)) => {
                // UNSAFE(ballidx): `header` was the slot we just overwrote in `replace`;
                // nothing else in the tree can reach it concurrently (`&mut self`)
                unsafe { header.as_mut() }.add(payload);
                self.replace(key, Slot::Many(header));
            }
            Some(Slot::One(old)) => {
                let mut header = BucketHeader::create(old);
                // UNSAFE(ballidx): `header` was just allocated, unaliased
                unsafe { header.as_mut() }.add(payload);
                self.replace(key, Slot::Many(header));
            }
        }
        Ok(())
    }

    /// Remove `payload` from under `key`. Only bucket-level shrinkage is implemented: removing
    /// the sole payload under a key (which would remove the key from the leaf entirely) returns
    /// `Err(Error::NotImplemented)` rather than performing a structural delete.
    pub fn remove(&mut self, key: f32, payload: NonNull<P>) -> IndexResult<()> {
        if !key.is_finite() {
            return Err(Error::BadKey);
        }
        let mut leaf = self.find_leaf(key);
        // UNSAFE(ballidx): `leaf` is reachable from `self.root`; `&mut self` guarantees
        // exclusive access
        let n = unsafe { leaf.as_mut() };
        let mut found = None;
        for i in 0..n.weight() {
            if n.keys[i] == key {
                found = Some(i);
                break;
            }
        }
        let i = found.ok_or(Error::PayloadNotFound)?;
        match n.values[i + 1] {
            NodeValue::Payload(Slot::One(p)) => {
                if p == payload {
                    Err(Error::NotImplemented)
                } else {
                    Err(Error::PayloadNotFound)
                }
            }
            NodeValue::Payload(Slot::Many(mut header)) => {
                // UNSAFE(ballidx): `header` is this leaf's own bucket slot, reachable only
                // through this `&mut self` call
                let h = unsafe { header.as_mut() };
                if !h.remove(payload) {
                    return Err(Error::PayloadNotFound);
                }
                if h.is_singleton() {
                    let last = h.singleton_value();
                    // UNSAFE(ballidx): the header is about to be unlinked from the only leaf
                    // slot that referenced it, so nothing else can reach it afterward
                    unsafe { BucketHeader::destroy(header) };
                    n.values[i + 1] = NodeValue::Payload(Slot::One(last));
                }
                log::trace!("removed payload from bucket at key {key}");
                Ok(())
            }
            _ => panic!("leaf slot held a child pointer; tree is corrupt"),
        }
    }

    /// Always fails: key mutation is not implemented (matching the reference's empty stub).
    pub fn update(&mut self, _old_key: f32, _new_key: f32) -> IndexResult<()> {
        Err(Error::NotImplemented)
    }

    /// Push every payload whose key lies in `[k0, k1]` through `callback`, batched via `buf`.
    pub fn range_search(
        &self,
        k0: f32,
        k1: f32,
        buf: &mut IterationBuffer<P>,
        mut callback: impl FnMut(&[BatchEntry<P>]),
    ) -> IndexResult<()> {
        if !k0.is_finite() || !k1.is_finite() {
            return Err(Error::BadKey);
        }
        if k0 > k1 {
            return Err(Error::BadRange);
        }
        let mut leaf = Some(self.find_leaf(k0));
        while let Some(cur) = leaf {
            // UNSAFE(ballidx): every node reachable from `self.root` is live for the tree's
            // lifetime
            let n = unsafe { cur.as_ref() };
            if n.keys[0] > k1 {
                break;
            }
            let mut i = 0;
            while i < crate::node::ORDER && n.keys[i] <= k1 {
                if n.keys[i] >= k0 {
                    match n.values[i + 1] {
                        NodeValue::Payload(Slot::One(p)) => buf.put(BatchEntry::Payload(p)),
                        NodeValue::Payload(Slot::Many(h)) => buf.put(BatchEntry::Bucket(h)),
                        _ => panic!("leaf slot held a child pointer; tree is corrupt"),
                    }
                }
                i += 1;
            }
            leaf = n.next;
            buf.ensure_space(&mut callback);
        }
        buf.flush(&mut callback);
        Ok(())
    }

    /// Equivalent to `range_search(k, k, buf, callback)`.
    pub fn search(
        &self,
        k: f32,
        buf: &mut IterationBuffer<P>,
        callback: impl FnMut(&[BatchEntry<P>]),
    ) -> IndexResult<()> {
        self.range_search(k, k, buf, callback)
    }

    /// Equivalent to `range_search(mag - (rad + r), mag + (rad + r), buf, callback)`.
    pub fn ball_query(
        &self,
        mag: f32,
        rad: f32,
        r: f32,
        buf: &mut IterationBuffer<P>,
        callback: impl FnMut(&[BatchEntry<P>]),
    ) -> IndexResult<()> {
        let reach = rad + r;
        self.range_search(mag - reach, mag + reach, buf, callback)
    }

    /// Debug invariant probe: starting from the first leaf with a key `>= since`, verify keys
    /// are non-decreasing within every leaf and across leaf boundaries.
    ///
    /// # Panics
    /// If sort order is violated anywhere in the chain.
    pub fn test_if_values_are_sorted(&self, since: f32) {
        let mut leaf = Some(self.find_leaf(since));
        let mut last_key = f32::NEG_INFINITY;
        while let Some(cur) = leaf {
            // UNSAFE(ballidx): every node reachable from `self.root` is live for the tree's
            // lifetime
            let n = unsafe { cur.as_ref() };
            if last_key > n.keys[0] {
                panic!("not sorted: leaf boundary violation");
            }
            for i in 0..crate::node::ORDER - 1 {
                if n.keys[i] > n.keys[i + 1] {
                    panic!("not sorted within a node");
                }
                if n.keys[i + 1].is_infinite() {
                    last_key = n.keys[i];
                    break;
                }
            }
            leaf = n.next;
        }
    }

    /// Debug invariant probe: the root must be internal, or a leaf with no sibling.
    ///
    /// # Panics
    /// If the root is a leaf with a sibling (which would mean it isn't actually the first leaf).
    pub fn test_if_root_is_non_degenerate(&self) {
        // UNSAFE(ballidx): `self.root` is always live
        let root = unsafe { self.root.as_ref() };
        if root.is_leaf() && root.next.is_some() {
            panic!("root node is broken (degenerate)");
        }
    }
}

impl<P> Default for Tree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Drop for Tree<P> {
    fn drop(&mut self) {
        // UNSAFE(ballidx): `self.root` is exclusively owned by this tree and nothing
        // outlives `drop`
        unsafe { free_subtree(self.root) };
    }
}

/// Recursively free a node and everything it owns (child nodes, bucket headers and chunks).
/// Never touches the payloads themselves, which the tree never owned.
///
/// # Safety
/// `node` must not be reachable from anywhere else after this call.
unsafe fn free_subtree<P>(node: NonNull<Node<P>>) {
    let boxed = Box::from_raw(node.as_ptr());
    if boxed.is_leaf() {
        for v in boxed.values.iter() {
            if let NodeValue::Payload(Slot::Many(h)) = v {
                BucketHeader::destroy(*h);
            }
        }
    } else {
        for v in boxed.values.iter() {
            if let NodeValue::Child(c) = v {
                free_subtree(*c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Hitbox;

    fn leak(h: Hitbox) -> NonNull<Hitbox> {
        unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(h))) }
    }

    unsafe fn reclaim(p: NonNull<Hitbox>) -> Hitbox {
        *Box::from_raw(p.as_ptr())
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn collect(tree: &Tree<Hitbox>, k0: f32, k1: f32) -> Vec<NonNull<Hitbox>> {
        let mut buf = IterationBuffer::new();
        let mut out = Vec::new();
        tree.range_search(k0, k1, &mut buf, |batch| {
            out.extend(crate::iter::PayloadIter::new(batch));
        })
        .unwrap();
        out
    }

    #[test]
    fn sequential_insert_and_point_range() {
        let mut tree = Tree::new();
        let mut ptrs = Vec::new();
        for k in [1.0f32, 1.5, 2.0, 2.5, 3.0, 3.5] {
            let p = leak(Hitbox::new(k, 0.0, k, 0.0));
            tree.insert(k, p).unwrap();
            ptrs.push(p);
        }
        let found = collect(&tree, 1.5, 2.5);
        assert_eq!(found.len(), 3);
        tree.test_if_values_are_sorted(f32::NEG_INFINITY);
        tree.test_if_root_is_non_degenerate();
        unsafe {
            for p in ptrs {
                reclaim(p);
            }
        }
    }

    #[test]
    fn random_order_insert_and_range() {
        use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

        init_logging();
        let mut keys = [1.0f32, 1.5, 2.0, 2.5, 3.0, 3.5];
        let mut rng = StdRng::seed_from_u64(0xBA11);
        keys.shuffle(&mut rng);

        let mut tree = Tree::new();
        let mut ptrs = Vec::new();
        for k in keys {
            let p = leak(Hitbox::new(k, 0.0, k, 0.0));
            tree.insert(k, p).unwrap();
            ptrs.push(p);
        }
        let found = collect(&tree, 1.5, 2.5);
        assert_eq!(found.len(), 3);
        unsafe {
            for p in ptrs {
                reclaim(p);
            }
        }
    }

    #[test]
    fn duplicate_key_insert_forms_bucket() {
        let mut tree = Tree::new();
        let a = leak(Hitbox::new(0.0, 0.0, 0.0, 0.0));
        let b = leak(Hitbox::new(1.0, 0.0, 0.0, 0.0));
        let c = leak(Hitbox::new(2.0, 0.0, 0.0, 0.0));
        let d = leak(Hitbox::new(3.0, 0.0, 0.0, 0.0));
        let e = leak(Hitbox::new(4.0, 0.0, 0.0, 0.0));
        for p in [a, b, c] {
            tree.insert(2.0, p).unwrap();
        }
        for p in [d, e] {
            tree.insert(1.5, p).unwrap();
        }
        let found = collect(&tree, 1.0, 2.0);
        assert_eq!(found.len(), 5);
        unsafe {
            for p in [a, b, c, d, e] {
                reclaim(p);
            }
        }
    }

    #[test]
    fn uniform_duplicate_stress() {
        let mut tree = Tree::new();
        let mut ptrs = Vec::new();
        for i in 0..103 {
            let p = leak(Hitbox::new(i as f32, 0.0, 0.0, 0.0));
            tree.insert(2.0, p).unwrap();
            ptrs.push(p);
        }
        let found = collect(&tree, 1.5, 2.0);
        assert_eq!(found.len(), 103);
        unsafe {
            for p in ptrs {
                reclaim(p);
            }
        }
    }

    #[test]
    fn reverse_order_bulk_insert_stays_sorted() {
        let mut tree = Tree::new();
        let mut ptrs = Vec::new();
        for k in (3..=99).rev() {
            let p = leak(Hitbox::new(k as f32, 0.0, 0.0, 0.0));
            tree.insert(k as f32, p).unwrap();
            ptrs.push(p);
        }
        tree.test_if_values_are_sorted(1.0);
        let found = collect(&tree, 1.0, 100.0);
        assert_eq!(found.len(), 97);
        unsafe {
            for p in ptrs {
                reclaim(p);
            }
        }
    }

    #[test]
    fn empty_tree_query_yields_nothing() {
        let tree: Tree<Hitbox> = Tree::new();
        let mut invocations = 0usize;
        let mut buf = IterationBuffer::new();
        tree.range_search(1.5, 2.5, &mut buf, |_| invocations += 1)
            .unwrap();
        assert_eq!(invocations, 0);
    }

    #[test]
    fn singleton_query() {
        let mut tree = Tree::new();
        let p = leak(Hitbox::new(12.0, 0.0, 0.0, 0.0));
        tree.insert(12.0, p).unwrap();
        let found = collect(&tree, 11.0, 12.0);
        assert_eq!(found.len(), 1);
        tree.test_if_root_is_non_degenerate();
        unsafe {
            reclaim(p);
        }
    }

    #[test]
    fn bucket_collapses_back_to_bare_payload_on_remove() {
        let mut tree = Tree::new();
        let a = leak(Hitbox::new(0.0, 0.0, 0.0, 0.0));
        let b = leak(Hitbox::new(1.0, 0.0, 0.0, 0.0));
        tree.insert(4.0, a).unwrap();
        tree.insert(4.0, b).unwrap();
        tree.remove(4.0, a).unwrap();
        let found = collect(&tree, 4.0, 4.0);
        assert_eq!(found, vec![b]);
        unsafe {
            reclaim(a);
            reclaim(b);
        }
    }

    #[test]
    fn bad_key_is_rejected_without_mutation() {
        let mut tree = Tree::new();
        let p = leak(Hitbox::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(tree.insert(f32::NAN, p).unwrap_err(), Error::BadKey);
        assert_eq!(tree.insert(f32::INFINITY, p).unwrap_err(), Error::BadKey);
        let found = collect(&tree, f32::MIN, f32::MAX);
        assert!(found.is_empty());
        unsafe {
            reclaim(p);
        }
    }
}
