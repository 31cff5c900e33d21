/*
 * Created on Mon Jul 06 2026
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

//! `ballidx`: an in-memory ordered multi-map over `f32` keys, built as a B+ tree with a
//! forward-linked leaf chain and batched callback-driven range scans.
//!
//! Multiple payloads may share one key: the second insert at a key promotes that leaf slot
//! from a bare payload into a bucket, transparently flattened back out by [`PayloadIter`] when
//! a range scan's output batch is consumed. The motivating use case is a spatial index keyed on
//! a hitbox's distance from the origin, queried with [`Tree::ball_query`], but the tree itself
//! is agnostic to what `P` is — it stores `NonNull<P>` and never reads through it.
//!
//! ```
//! use ballidx::{Hitbox, IterationBuffer, PayloadIter, Tree};
//! use std::ptr::NonNull;
//!
//! let mut tree: Tree<Hitbox> = Tree::new();
//! let hb = Box::new(Hitbox::new(3.0, 4.0, 3.0, 4.0)); // magnitude 5.0
//! let hb = unsafe { NonNull::new_unchecked(Box::into_raw(hb)) };
//! tree.insert(hb_magnitude(&hb), hb).unwrap();
//!
//! let mut buf = IterationBuffer::new();
//! let mut found = 0;
//! tree.ball_query(5.0, 0.0, 1.0, &mut buf, |batch| {
//!     found += PayloadIter::new(batch).count();
//! }).unwrap();
//! assert_eq!(found, 1);
//!
//! // the tree never frees payloads; the caller reclaims them after use
//! unsafe { drop(Box::from_raw(hb.as_ptr())) };
//!
//! fn hb_magnitude(p: &NonNull<Hitbox>) -> f32 {
//!     unsafe { p.as_ref() }.magnitude()
//! }
//! ```

mod bucket;
mod error;
mod iter;
mod mem;
mod node;
mod payload;
mod tree;

pub use error::{Error, IndexResult};
pub use iter::{BatchEntry, IterationBuffer, BUFFER_CAP};
pub use node::{Slot, ORDER, SPLIT_INDEX};
pub use payload::Hitbox;
pub use tree::Tree;
pub use iter::PayloadIter;
pub use bucket::{BucketHeader, CHUNK_CAP, HEADER_CAP};
