use std::num::NonZero;
use std::ops::Range;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::{require_positive, try_zeroed};
use crate::partition::{ChunkSizing, ClaimCursor, DisjointSlice, static_block};
use crate::{Error, Result, WorkerPool, WorkloadOutput, workload};

/// Selects how the iterations of a loop are distributed across workers.
///
/// Parses from the policy name (`static`, `dynamic`, `guided`) or from its numeric selector
/// (`1`, `2`, `3`).
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SchedulePolicy {
    /// The range is split up front into one contiguous block per worker.
    #[display("static")]
    Static,

    /// Workers repeatedly claim fixed-size chunks from a shared cursor.
    #[display("dynamic")]
    Dynamic,

    /// Workers claim chunks from a shared cursor, with chunks shrinking as work runs out.
    #[display("guided")]
    Guided,
}

impl SchedulePolicy {
    /// Every policy, in selector order.
    pub const ALL: [Self; 3] = [Self::Static, Self::Dynamic, Self::Guided];
}

impl FromStr for SchedulePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "static" | "1" => Ok(Self::Static),
            "dynamic" | "2" => Ok(Self::Dynamic),
            "guided" | "3" => Ok(Self::Guided),
            _ => Err(Error::invalid_argument(
                "schedule",
                format!("'{s}' is not one of static (1), dynamic (2), guided (3)"),
            )),
        }
    }
}

/// A scheduling policy together with its validated chunk size parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Schedule {
    /// One contiguous block of near-equal size per worker.
    Static,

    /// Chunks of exactly `chunk_size` indices (the last one may be shorter).
    Dynamic {
        /// Number of indices claimed at a time.
        chunk_size: NonZero<usize>,
    },

    /// Chunks of roughly `remaining / workers` indices, never smaller than `min_chunk_size`
    /// (the last one may be shorter).
    Guided {
        /// Lower bound for the size of a claimed chunk.
        min_chunk_size: NonZero<usize>,
    },
}

impl Schedule {
    /// Combines a policy with a chunk size.
    ///
    /// The chunk size is ignored by the static policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the policy is dynamic or guided and `chunk_size`
    /// is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use par_patterns::{Schedule, SchedulePolicy};
    ///
    /// let schedule = Schedule::new(SchedulePolicy::Guided, 16)?;
    /// assert_eq!(schedule.policy(), SchedulePolicy::Guided);
    ///
    /// assert!(Schedule::new(SchedulePolicy::Dynamic, 0).is_err());
    /// assert_eq!(Schedule::new(SchedulePolicy::Static, 0)?, Schedule::Static);
    /// # Ok::<(), par_patterns::Error>(())
    /// ```
    pub fn new(policy: SchedulePolicy, chunk_size: usize) -> Result<Self> {
        let chunk_size = || {
            NonZero::new(chunk_size).ok_or_else(|| {
                Error::invalid_argument(
                    "chunk_size",
                    format!("must be greater than zero for the {policy} policy"),
                )
            })
        };

        Ok(match policy {
            SchedulePolicy::Static => Self::Static,
            SchedulePolicy::Dynamic => Self::Dynamic {
                chunk_size: chunk_size()?,
            },
            SchedulePolicy::Guided => Self::Guided {
                min_chunk_size: chunk_size()?,
            },
        })
    }

    /// Returns the policy this schedule applies.
    #[must_use]
    pub fn policy(&self) -> SchedulePolicy {
        match self {
            Self::Static => SchedulePolicy::Static,
            Self::Dynamic { .. } => SchedulePolicy::Dynamic,
            Self::Guided { .. } => SchedulePolicy::Guided,
        }
    }
}

/// Computes the workload output vector for `0..len` on a fresh pool of `thread_count`
/// workers, distributing indices according to `policy`.
///
/// Every index `i` gets `workload(i % modulus)`. The pool is created for this call and joined
/// before it returns.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `len`, `modulus` or `thread_count` is zero, or if
/// the policy needs a chunk size and `chunk_size` is zero. Returns [`Error::Allocation`] if
/// the output vector cannot be allocated and [`Error::WorkerSpawn`] if the pool cannot be
/// created. All checks happen before any work begins.
///
/// # Examples
///
/// ```
/// use par_patterns::{SchedulePolicy, run_scheduled, sequential};
///
/// let parallel = run_scheduled(20, 10, SchedulePolicy::Static, 1, 4)?;
/// let reference = sequential::run_scheduled(20, 10)?;
///
/// assert_eq!(parallel.checksum(), reference.checksum());
/// # Ok::<(), par_patterns::Error>(())
/// ```
pub fn run_scheduled(
    len: usize,
    modulus: usize,
    policy: SchedulePolicy,
    chunk_size: usize,
    thread_count: usize,
) -> Result<WorkloadOutput> {
    require_positive("len", len)?;
    require_positive("modulus", modulus)?;
    let schedule = Schedule::new(policy, chunk_size)?;

    let mut pool = WorkerPool::new(thread_count)?;

    run_scheduled_on(&mut pool, len, modulus, schedule)
}

/// Computes the workload output vector for `0..len` on an existing pool.
///
/// Every worker of the pool participates.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `len` or `modulus` is zero and
/// [`Error::Allocation`] if the output vector cannot be allocated.
pub fn run_scheduled_on(
    pool: &mut WorkerPool,
    len: usize,
    modulus: usize,
    schedule: Schedule,
) -> Result<WorkloadOutput> {
    require_positive("len", len)?;
    let modulus = NonZero::new(modulus)
        .ok_or_else(|| Error::invalid_argument("modulus", "must be greater than zero"))?;

    let mut values = try_zeroed::<u64>("output vector", len)?;

    fill_scheduled(pool, &mut values, schedule, |_, index| {
        workload(index % modulus)
    });

    Ok(WorkloadOutput::new(values))
}

/// Fills every slot of `output` with `f(worker_index, index)`, distributing the indices
/// across the workers of `pool` according to `schedule`.
///
/// Every index is claimed by exactly one worker and `f` is called exactly once per index,
/// on the worker that claimed it. Slots are written by index, so the final content of
/// `output` does not depend on the order in which workers finish.
///
/// # Examples
///
/// Tagging every slot with the worker that computed it:
///
/// ```
/// use par_patterns::{Schedule, SchedulePolicy, WorkerPool, fill_scheduled};
///
/// let mut pool = WorkerPool::new(2)?;
/// let mut owners = vec![usize::MAX; 6];
///
/// fill_scheduled(&mut pool, &mut owners, Schedule::Static, |worker_index, _| worker_index);
///
/// assert_eq!(owners, vec![0, 0, 0, 1, 1, 1]);
/// # Ok::<(), par_patterns::Error>(())
/// ```
pub fn fill_scheduled<T, F>(pool: &mut WorkerPool, output: &mut [T], schedule: Schedule, f: F)
where
    T: Send,
    F: Fn(usize, usize) -> T + Sync,
{
    let len = output.len();
    let worker_count = pool.thread_count();

    debug!(
        len,
        ?schedule,
        workers = worker_count.get(),
        "running scheduled loop"
    );

    let cursor = match schedule {
        Schedule::Static => None,
        Schedule::Dynamic { chunk_size } => {
            Some(ClaimCursor::new(len, ChunkSizing::Fixed(chunk_size)))
        }
        Schedule::Guided { min_chunk_size } => Some(ClaimCursor::new(
            len,
            ChunkSizing::Shrinking {
                worker_count,
                min_chunk_size,
            },
        )),
    };

    let slots = DisjointSlice::new(output);

    pool.broadcast(|worker_index| {
        let mut chunks = 0_usize;

        let mut fill = |range: Range<usize>| {
            // SAFETY: Static blocks of distinct workers never overlap and the claim cursor
            // never hands out the same index twice, so no two live references overlap.
            let chunk = unsafe { slots.range_mut(range.clone()) };

            for (index, slot) in range.zip(chunk) {
                *slot = f(worker_index, index);
            }

            chunks = chunks.wrapping_add(1);
        };

        match &cursor {
            None => {
                let block = static_block(len, worker_count, worker_index);

                if !block.is_empty() {
                    fill(block);
                }
            }
            Some(cursor) => cursor.claims().for_each(&mut fill),
        }

        trace!(worker_index, chunks, "worker finished its share of the loop");
    });
}
