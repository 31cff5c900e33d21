/*
 * Created on Wed Jul 08 2026
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

//! Batched output for range scans: a fixed-capacity buffer that accumulates leaf slots while
//! walking the sibling chain and flushes to a caller callback whenever it risks overflowing on
//! the next leaf, plus a flat [`Iterator`] over the payloads such a flush contains.
//!
//! The reference engine's `HitboxIterator` wrote directly into a caller-sized output array and
//! called `interact()` itself whenever the array filled; it also flattened bucket heads into
//! their members inline, by hand, inside the scan loop. Here that's split into two pieces that
//! compose instead: [`IterationBuffer`] only knows how to batch and flush raw entries, and
//! [`PayloadIter`] is a standalone state machine (mirroring the reference's
//! `HitboxIterator::generate_input`) that flattens one flushed batch into payloads.

use crate::{bucket::BucketHeader, mem::FixedVec, node::ORDER};
use core::ptr::NonNull;

/// Capacity of the batch buffer. Must hold at least two full leaves' worth of entries so that
/// `ensure_space` always has somewhere to flush *before* the next leaf is scanned, never mid-leaf.
pub const BUFFER_CAP: usize = 80;

const _: () = assert!(
    BUFFER_CAP >= 2 * ORDER,
    "BUFFER_CAP must hold at least two leaves' worth of entries"
);

/// One slot worth of batched output: either a bare payload or the head of a multi-value bucket.
pub enum BatchEntry<P> {
    Payload(NonNull<P>),
    Bucket(NonNull<BucketHeader<P>>),
}

impl<P> Clone for BatchEntry<P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for BatchEntry<P> {}

/// Accumulates [`BatchEntry`]s across leaves and flushes them to a callback in capacity-sized
/// batches, rather than one payload at a time.
pub struct IterationBuffer<P> {
    buf: FixedVec<BUFFER_CAP, BatchEntry<P>>,
}

impl<P> IterationBuffer<P> {
    pub fn new() -> Self {
        Self { buf: FixedVec::new() }
    }

    /// Append one entry. Caller must have called [`Self::ensure_space`] first if a whole leaf is
    /// about to be appended.
    pub fn put(&mut self, entry: BatchEntry<P>) {
        self.buf.push(entry);
    }

    /// Flush now if fewer than one node's worth of room remains. Called once per leaf, before
    /// that leaf's entries are appended, so a leaf's entries are never split across two flushes.
    pub fn ensure_space(&mut self, on_flush: &mut dyn FnMut(&[BatchEntry<P>])) {
        if self.buf.capacity() - self.buf.len() < ORDER {
            self.flush(on_flush);
        }
    }

    /// Flush whatever is currently buffered, unconditionally. Called once more after the scan
    /// ends to deliver the final partial batch.
    pub fn flush(&mut self, on_flush: &mut dyn FnMut(&[BatchEntry<P>])) {
        if !self.buf.is_empty() {
            on_flush(self.buf.as_slice());
            self.buf.clear();
        }
    }
}

impl<P> Default for IterationBuffer<P> {
    fn default() -> Self {
        Self::new()
    }
}

enum IterState<P> {
    /// scanning the flushed batch slice itself, at index `i`
    InBatch(usize),
    /// inside a bucket's inline header array
    InHeader {
        head: NonNull<BucketHeader<P>>,
        idx: usize,
        live: usize,
        resume_at: usize,
    },
    /// inside one of a bucket's overflow chunks
    InChunk {
        head: NonNull<BucketHeader<P>>,
        chunk: NonNull<crate::bucket::BucketChunk<P>>,
        idx: usize,
        live: usize,
        resume_at: usize,
    },
    Ended,
}

/// Flattens one flushed batch (a mix of bare payloads and bucket heads) into a single sequence
/// of payload pointers, expanding each bucket's header-inline array and chunk chain in place.
pub struct PayloadIter<'a, P> {
    batch: &'a [BatchEntry<P>],
    state: IterState<P>,
}

impl<'a, P> PayloadIter<'a, P> {
    pub fn new(batch: &'a [BatchEntry<P>]) -> Self {
        Self {
            batch,
            state: if batch.is_empty() {
                IterState::Ended
            } else {
                IterState::InBatch(0)
            },
        }
    }
}

impl<'a, P> Iterator for PayloadIter<'a, P> {
    type Item = NonNull<P>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                IterState::Ended => return None,
                IterState::InBatch(i) => {
                    if i >= self.batch.len() {
                        self.state = IterState::Ended;
                        continue;
                    }
                    match self.batch[i] {
                        BatchEntry::Payload(p) => {
                            self.state = IterState::InBatch(i + 1);
                            return Some(p);
                        }
                        BatchEntry::Bucket(head) => {
                            // UNSAFE(ballidx): `head` came from a leaf slot flushed this
                            // batch; the tree is never mutated concurrently with a scan over
                            // its own output
                            let live = unsafe { head.as_ref() }.header_live();
                            self.state = IterState::InHeader {
                                head,
                                idx: 0,
                                live,
                                resume_at: i + 1,
                            };
                        }
                    }
                }
                IterState::InHeader {
                    head,
                    idx,
                    live,
                    resume_at,
                } => {
                    if idx < live {
                        // UNSAFE(ballidx): see InBatch's bucket arm
                        let p = unsafe { head.as_ref() }.inline_at(idx);
                        self.state = IterState::InHeader {
                            head,
                            idx: idx + 1,
                            live,
                            resume_at,
                        };
                        return Some(p);
                    }
                    // UNSAFE(ballidx): see InBatch's bucket arm
                    let header = unsafe { head.as_ref() };
                    self.state = match header.first_chunk() {
                        Some(chunk) => {
                            // UNSAFE(ballidx): chunk pointers reachable from a live bucket's
                            // `first` chain are themselves live for the scan's duration
                            let chunk_live = unsafe { chunk.as_ref() }.live(header.tail_len());
                            IterState::InChunk {
                                head,
                                chunk,
                                idx: 0,
                                live: chunk_live,
                                resume_at,
                            }
                        }
                        None => IterState::InBatch(resume_at),
                    };
                }
                IterState::InChunk {
                    head,
                    chunk,
                    idx,
                    live,
                    resume_at,
                } => {
                    if idx < live {
                        // UNSAFE(ballidx): see InHeader's chunk arm
                        let p = unsafe { chunk.as_ref() }.at(idx);
                        self.state = IterState::InChunk {
                            head,
                            chunk,
                            idx: idx + 1,
                            live,
                            resume_at,
                        };
                        return Some(p);
                    }
                    // UNSAFE(ballidx): see InHeader's chunk arm
                    let cur = unsafe { chunk.as_ref() };
                    self.state = match cur.next_chunk() {
                        Some(next) => {
                            // UNSAFE(ballidx): `head` is still the live bucket this chunk
                            // chain belongs to
                            let tail_len = unsafe { head.as_ref() }.tail_len();
                            // UNSAFE(ballidx): see InHeader's chunk arm
                            let next_live = unsafe { next.as_ref() }.live(tail_len);
                            IterState::InChunk {
                                head,
                                chunk: next,
                                idx: 0,
                                live: next_live,
                                resume_at,
                            }
                        }
                        None => IterState::InBatch(resume_at),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketHeader;

    fn leak(v: u32) -> NonNull<u32> {
        unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(v))) }
    }

    #[test]
    fn buffer_flushes_before_overflow() {
        let mut buf: IterationBuffer<u32> = IterationBuffer::new();
        let mut flushes = 0usize;
        for _ in 0..3 {
            buf.ensure_space(&mut |_| flushes += 1);
            for _ in 0..ORDER {
                buf.put(BatchEntry::Payload(leak(7)));
            }
        }
        buf.flush(&mut |_| flushes += 1);
        assert!(flushes >= 1);
    }

    #[test]
    fn payload_iter_flattens_bare_payloads() {
        let batch = vec![
            BatchEntry::Payload(leak(1)),
            BatchEntry::Payload(leak(2)),
            BatchEntry::Payload(leak(3)),
        ];
        let out: Vec<u32> = PayloadIter::new(&batch)
            .map(|p| unsafe { *p.as_ptr() })
            .collect();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn payload_iter_flattens_bucket_across_chunks() {
        let mut header = unsafe { Box::from_raw(BucketHeader::create(leak(0)).as_ptr()) };
        for i in 1..18u32 {
            header.add(leak(i));
        }
        let head_ptr = unsafe { NonNull::new_unchecked(Box::into_raw(header)) };
        let batch = vec![
            BatchEntry::Payload(leak(999)),
            BatchEntry::Bucket(head_ptr),
            BatchEntry::Payload(leak(1000)),
        ];
        let out: Vec<u32> = PayloadIter::new(&batch)
            .map(|p| unsafe { *p.as_ptr() })
            .collect();
        assert_eq!(out.len(), 20);
        assert_eq!(out[0], 999);
        assert_eq!(&out[1..18], &(0..17).collect::<Vec<_>>()[..]);
        assert_eq!(out[19], 1000);
    }
}
