//! Bounded histogram construction under different synchronization strategies.
//!
//! Samples are always split across workers the same way, one contiguous block per worker,
//! so the strategies differ only in how an individual increment is made safe:
//!
//! * [`SyncStrategy::Critical`] takes one global lock around every increment.
//! * [`SyncStrategy::Atomic`] performs every increment as an atomic add on the bin.
//! * [`SyncStrategy::Local`] counts into a private histogram per worker and then sums the
//!   private histograms bin by bin in a second parallel phase.

use std::num::NonZero;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{require_positive, try_filled, try_zeroed};
use crate::partition::{DisjointSlice, static_block};
use crate::{Error, Histogram, Result, WorkerPool};

/// Selects how concurrent increments of the shared histogram are synchronized.
///
/// Parses from the strategy name (`critical`, `atomic`, `local`) or from its numeric selector
/// (`1`, `2`, `3`).
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SyncStrategy {
    /// A single global lock guards every increment.
    ///
    /// This serializes all increments regardless of bin and is expected not to scale.
    #[display("critical")]
    Critical,

    /// Every increment is one atomic add on the bin, with no broader lock.
    #[display("atomic")]
    Atomic,

    /// Every worker counts into its own private histogram, followed by a reduction.
    #[display("local")]
    Local,
}

impl SyncStrategy {
    /// Every strategy, in selector order.
    pub const ALL: [Self; 3] = [Self::Critical, Self::Atomic, Self::Local];
}

impl FromStr for SyncStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "critical" | "1" => Ok(Self::Critical),
            "atomic" | "2" => Ok(Self::Atomic),
            "local" | "3" => Ok(Self::Local),
            _ => Err(Error::invalid_argument(
                "strategy",
                format!("'{s}' is not one of critical (1), atomic (2), local (3)"),
            )),
        }
    }
}

/// Builds the histogram of `samples` over `0..bins` on a fresh pool of `thread_count`
/// workers, synchronizing increments according to `strategy`.
///
/// The pool is created for this call and joined before it returns.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `samples` is empty or `bins` or `thread_count` is
/// zero, [`Error::SampleOutOfRange`] if any sample is not less than `bins`,
/// [`Error::Allocation`] if the shared or a per-thread histogram cannot be allocated and
/// [`Error::WorkerSpawn`] if the pool cannot be created.
///
/// # Examples
///
/// ```
/// use par_patterns::{SyncStrategy, run_histogram};
///
/// let samples = [0, 3, 3, 1, 3];
/// let histogram = run_histogram(&samples, 4, SyncStrategy::Local, 2)?;
///
/// assert_eq!(histogram.counts(), &[1, 1, 0, 3]);
/// assert_eq!(histogram.total(), 5);
/// # Ok::<(), par_patterns::Error>(())
/// ```
pub fn run_histogram(
    samples: &[usize],
    bins: usize,
    strategy: SyncStrategy,
    thread_count: usize,
) -> Result<Histogram> {
    validate_samples(samples, bins)?;

    let mut pool = WorkerPool::new(thread_count)?;

    count_validated(&mut pool, samples, bins, strategy)
}

/// Builds the histogram of `samples` over `0..bins` on an existing pool.
///
/// Every worker of the pool participates.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `samples` is empty or `bins` is zero,
/// [`Error::SampleOutOfRange`] if any sample is not less than `bins` and
/// [`Error::Allocation`] if the shared or a per-thread histogram cannot be allocated.
pub fn run_histogram_on(
    pool: &mut WorkerPool,
    samples: &[usize],
    bins: usize,
    strategy: SyncStrategy,
) -> Result<Histogram> {
    validate_samples(samples, bins)?;

    count_validated(pool, samples, bins, strategy)
}

/// Checks that there is at least one sample and one bin and that every sample has a bin.
pub(crate) fn validate_samples(samples: &[usize], bins: usize) -> Result<()> {
    require_positive("len", samples.len())?;
    require_positive("bins", bins)?;

    match samples
        .iter()
        .enumerate()
        .find(|(_, value)| **value >= bins)
    {
        Some((index, value)) => Err(Error::SampleOutOfRange {
            index,
            value: *value,
            bins,
        }),
        None => Ok(()),
    }
}

fn count_validated(
    pool: &mut WorkerPool,
    samples: &[usize],
    bins: usize,
    strategy: SyncStrategy,
) -> Result<Histogram> {
    debug!(
        len = samples.len(),
        bins,
        %strategy,
        workers = pool.thread_count().get(),
        "building histogram"
    );

    let counts = match strategy {
        SyncStrategy::Critical => count_critical(pool, samples, bins)?,
        SyncStrategy::Atomic => count_atomic(pool, samples, bins)?,
        SyncStrategy::Local => count_local(pool, samples, bins)?,
    };

    Ok(Histogram::new(counts))
}

fn count_critical(pool: &mut WorkerPool, samples: &[usize], bins: usize) -> Result<Vec<u64>> {
    let histogram = Mutex::new(try_zeroed::<u64>("histogram", bins)?);
    let worker_count = pool.thread_count();

    pool.broadcast(|worker_index| {
        for sample in worker_samples(samples, worker_count, worker_index) {
            // One lock acquisition per increment, held across the whole histogram.
            increment(&mut histogram.lock(), *sample);
        }
    });

    Ok(histogram.into_inner())
}

fn count_atomic(pool: &mut WorkerPool, samples: &[usize], bins: usize) -> Result<Vec<u64>> {
    let histogram = try_filled("histogram", bins, AtomicU64::default)?;
    let worker_count = pool.thread_count();

    pool.broadcast(|worker_index| {
        for sample in worker_samples(samples, worker_count, worker_index) {
            atomic_bin(&histogram, *sample).fetch_add(1, Ordering::Relaxed);
        }
    });

    // The pool has joined every worker, so plain reads observe all increments.
    Ok(histogram.into_iter().map(AtomicU64::into_inner).collect())
}

fn count_local(pool: &mut WorkerPool, samples: &[usize], bins: usize) -> Result<Vec<u64>> {
    let mut histogram = try_zeroed::<u64>("histogram", bins)?;
    let worker_count = pool.thread_count();

    let partials = pool.broadcast(|worker_index| -> Result<Vec<u64>> {
        let mut partial = try_zeroed::<u64>("per-thread histogram", bins)?;

        for sample in worker_samples(samples, worker_count, worker_index) {
            increment(&mut partial, *sample);
        }

        Ok(partial)
    });

    let partials = partials.into_vec().into_iter().collect::<Result<Vec<_>>>()?;

    let totals = DisjointSlice::new(&mut histogram);

    pool.broadcast(|worker_index| {
        let owned_bins = static_block(bins, worker_count, worker_index);

        // SAFETY: Static blocks of distinct workers never overlap.
        let owned_totals = unsafe { totals.range_mut(owned_bins.clone()) };

        reduce_bins(&partials, owned_bins.clone(), owned_totals);

        trace!(
            worker_index,
            bins = owned_bins.len(),
            "worker reduced its share of the bins"
        );
    });

    Ok(histogram)
}

/// Sums the per-thread counts of every bin in `bins` into `totals`, which holds exactly
/// those bins.
#[expect(
    clippy::indexing_slicing,
    reason = "every partial histogram covers all bins and `bins` is a block of them"
)]
fn reduce_bins(partials: &[Vec<u64>], bins: Range<usize>, totals: &mut [u64]) {
    for (bin, total) in bins.zip(totals) {
        *total = partials
            .iter()
            .fold(0, |sum, partial| sum.wrapping_add(partial[bin]));
    }
}

/// Returns the block of samples a worker is responsible for. Identical for every strategy.
#[expect(
    clippy::indexing_slicing,
    reason = "static blocks always lie within the range they partition"
)]
fn worker_samples(
    samples: &[usize],
    worker_count: NonZero<usize>,
    worker_index: usize,
) -> &[usize] {
    &samples[static_block(samples.len(), worker_count, worker_index)]
}

#[expect(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "samples are validated against the bin count before any work begins"
)]
pub(crate) fn increment(counts: &mut [u64], bin: usize) {
    counts[bin] += 1;
}

#[expect(
    clippy::indexing_slicing,
    reason = "samples are validated against the bin count before any work begins"
)]
fn atomic_bin(counts: &[AtomicU64], bin: usize) -> &AtomicU64 {
    &counts[bin]
}
