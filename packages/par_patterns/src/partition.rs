//! Primitives for splitting an index range across workers.
//!
//! * [`static_block()`] pre-partitions a range into one contiguous block per worker.
//! * [`ClaimCursor`] lets workers claim chunks of a range at runtime, with a chunk size that
//!   is either fixed (dynamic scheduling) or shrinks with the remaining work (guided).
//! * [`DisjointSlice`] lets several workers write into one slice at the same time, as long as
//!   every worker only touches ranges handed out by one of the above.

use std::cmp;
use std::iter;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ops::Range;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use num_integer::Integer;

/// Returns the contiguous block of `0..len` owned by `worker_index` when the range is split
/// into `worker_count` blocks of near-equal size.
///
/// The first `len % worker_count` blocks are one element longer than the rest. When there are
/// more workers than elements, the trailing blocks are empty.
///
/// # Panics
///
/// Panics if `worker_index` is not less than `worker_count`.
#[must_use]
#[expect(
    clippy::arithmetic_side_effects,
    reason = "every intermediate value is bounded by len"
)]
pub(crate) fn static_block(
    len: usize,
    worker_count: NonZero<usize>,
    worker_index: usize,
) -> Range<usize> {
    assert!(
        worker_index < worker_count.get(),
        "worker index {worker_index} out of bounds for {worker_count} workers"
    );

    let (base, extra) = len.div_rem(&worker_count.get());

    let start = worker_index * base + cmp::min(worker_index, extra);
    let size = base + usize::from(worker_index < extra);

    start..start + size
}

/// How a [`ClaimCursor`] sizes each chunk it hands out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ChunkSizing {
    /// Every chunk has this size, except possibly the last one.
    Fixed(NonZero<usize>),

    /// Each chunk is the remaining work divided by the worker count, rounded up, but never
    /// less than `min_chunk_size` (except possibly the last one).
    Shrinking {
        worker_count: NonZero<usize>,
        min_chunk_size: NonZero<usize>,
    },
}

impl ChunkSizing {
    fn chunk_size(self, remaining: usize) -> usize {
        let size = match self {
            Self::Fixed(size) => size.get(),
            Self::Shrinking {
                worker_count,
                min_chunk_size,
            } => cmp::max(remaining.div_ceil(worker_count.get()), min_chunk_size.get()),
        };

        cmp::min(size, remaining)
    }
}

/// Shared position in `0..len` from which workers claim their next chunk of indices.
///
/// Claims never overlap and never extend past `len`, so the chunks handed out over the
/// lifetime of a cursor are a disjoint cover of `0..len`.
#[derive(Debug)]
pub(crate) struct ClaimCursor {
    next: AtomicUsize,
    len: usize,
    sizing: ChunkSizing,
}

impl ClaimCursor {
    pub(crate) fn new(len: usize, sizing: ChunkSizing) -> Self {
        Self {
            next: AtomicUsize::new(0),
            len,
            sizing,
        }
    }

    /// Claims the next chunk, or returns `None` once the range is exhausted.
    pub(crate) fn claim(&self) -> Option<Range<usize>> {
        // Relaxed is enough: the cursor only has to hand out disjoint ranges. Visibility of the
        // data written into those ranges is provided by the pool joining its workers.
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |start| {
                let remaining = self.len.checked_sub(start).filter(|r| *r > 0)?;

                start.checked_add(self.sizing.chunk_size(remaining))
            })
            .ok()
            .map(|start| {
                let remaining = self.len.wrapping_sub(start);
                start..start.wrapping_add(self.sizing.chunk_size(remaining))
            })
    }

    /// Returns an iterator that claims chunks until the range is exhausted.
    pub(crate) fn claims(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        iter::from_fn(|| self.claim())
    }
}

/// A mutable slice that multiple workers may write into at the same time, each through its
/// own non-overlapping sub-range.
#[derive(derive_more::Debug)]
pub(crate) struct DisjointSlice<'a, T> {
    #[debug(ignore)]
    ptr: NonNull<T>,
    len: usize,
    _slice: PhantomData<&'a mut [T]>,
}

// SAFETY: The wrapper only hands out `&mut [T]` to disjoint ranges, which is equivalent to
// splitting the original `&mut [T]` and sending the parts to different threads.
unsafe impl<T: Send> Send for DisjointSlice<'_, T> {}
// SAFETY: See above. Shared access to the wrapper never produces overlapping references.
unsafe impl<T: Send> Sync for DisjointSlice<'_, T> {}

impl<'a, T> DisjointSlice<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        let len = slice.len();

        Self {
            ptr: NonNull::from(slice).cast(),
            len,
            _slice: PhantomData,
        }
    }

    /// Returns exclusive access to `range` of the underlying slice.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    ///
    /// # Safety
    ///
    /// The caller must ensure that no other reference obtained from this wrapper and still
    /// alive overlaps `range`.
    #[expect(
        clippy::mut_from_ref,
        reason = "exclusivity is guaranteed by the caller via disjoint ranges"
    )]
    pub(crate) unsafe fn range_mut(&self, range: Range<usize>) -> &'a mut [T] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {range:?} out of bounds for slice of length {}",
            self.len
        );

        // SAFETY: The range is in bounds of the original slice, which outlives 'a, and the
        // caller guarantees that nobody else holds a reference into it.
        unsafe {
            slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(range.start),
                range.end.wrapping_sub(range.start),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use new_zealand::nz;

    use super::*;

    fn covered_exactly_once(len: usize, chunks: impl IntoIterator<Item = Range<usize>>) -> bool {
        let mut visits = vec![0_u32; len];

        for chunk in chunks {
            for index in chunk {
                visits[index] += 1;
            }
        }

        visits.iter().all(|v| *v == 1)
    }

    #[test]
    fn static_blocks_cover_range_exactly_once() {
        for len in [1, 2, 7, 20, 64, 1000, 1001] {
            for workers in [1_usize, 2, 3, 4, 8, 16] {
                let worker_count = NonZero::new(workers).unwrap();
                let blocks = (0..workers).map(|w| static_block(len, worker_count, w));

                assert!(
                    covered_exactly_once(len, blocks),
                    "len {len}, workers {workers}"
                );
            }
        }
    }

    #[test]
    fn static_blocks_are_balanced() {
        let sizes: Vec<_> = (0..4)
            .map(|w| static_block(10, nz!(4), w).len())
            .collect();

        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(static_block(10, nz!(4), 0), 0..3);
        assert_eq!(static_block(10, nz!(4), 3), 8..10);
    }

    #[test]
    fn static_blocks_with_more_workers_than_elements() {
        assert_eq!(static_block(2, nz!(4), 0), 0..1);
        assert_eq!(static_block(2, nz!(4), 1), 1..2);
        assert!(static_block(2, nz!(4), 2).is_empty());
        assert!(static_block(2, nz!(4), 3).is_empty());
    }

    #[test]
    #[should_panic]
    fn static_block_rejects_worker_out_of_bounds() {
        let _block = static_block(10, nz!(2), 2);
    }

    #[test]
    fn fixed_claims_have_configured_size() {
        let cursor = ClaimCursor::new(10, ChunkSizing::Fixed(nz!(3)));

        let chunks: Vec<_> = cursor.claims().collect();

        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..10]);
        assert_eq!(cursor.claim(), None);
    }

    #[test]
    fn fixed_chunk_larger_than_range_claims_everything_once() {
        let cursor = ClaimCursor::new(5, ChunkSizing::Fixed(nz!(usize::MAX)));

        assert_eq!(cursor.claim(), Some(0..5));
        assert_eq!(cursor.claim(), None);
        assert_eq!(cursor.claim(), None);
    }

    #[test]
    fn shrinking_claims_decrease_to_minimum() {
        let cursor = ClaimCursor::new(
            100,
            ChunkSizing::Shrinking {
                worker_count: nz!(4),
                min_chunk_size: nz!(5),
            },
        );

        let sizes: Vec<_> = cursor.claims().map(|chunk| chunk.len()).collect();

        // 100/4=25, 75/4=19, 56/4=14, 42/4=11, 31/4=8, 23/4=6, then the floor of 5 applies.
        assert_eq!(sizes, vec![25, 19, 14, 11, 8, 6, 5, 5, 5, 2]);
        assert_eq!(sizes.iter().sum::<usize>(), 100);

        for pair in sizes.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn shrinking_claims_cover_range_exactly_once() {
        for len in [1, 9, 100, 12_345] {
            for min in [1, 3, 64] {
                let cursor = ClaimCursor::new(
                    len,
                    ChunkSizing::Shrinking {
                        worker_count: nz!(3),
                        min_chunk_size: NonZero::new(min).unwrap(),
                    },
                );

                assert!(covered_exactly_once(len, cursor.claims()));
            }
        }
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn concurrent_claims_are_disjoint() {
        let len = 100_000;
        let cursor = ClaimCursor::new(len, ChunkSizing::Fixed(nz!(7)));

        let chunks: Vec<Range<usize>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cursor.claims().collect::<Vec<_>>()))
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        assert!(covered_exactly_once(len, chunks));
    }

    #[test]
    fn disjoint_slice_writes_land_in_original() {
        let mut values = vec![0_u32; 6];

        {
            let slice = DisjointSlice::new(&mut values);

            // SAFETY: The two ranges do not overlap.
            let (left, right) = unsafe { (slice.range_mut(0..3), slice.range_mut(3..6)) };

            left.fill(1);
            right.fill(2);
        }

        assert_eq!(values, vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    #[should_panic]
    fn disjoint_slice_rejects_out_of_bounds_range() {
        let mut values = vec![0_u32; 4];
        let slice = DisjointSlice::new(&mut values);

        // SAFETY: No other references exist. The call panics before creating one.
        let _out_of_bounds = unsafe { slice.range_mut(2..5) };
    }
}
