//! Machine-parsable result records, one CSV line per run.

use std::fmt;
use std::time::Duration;

use crate::{SchedulePolicy, SyncStrategy};

/// Column names of [`ScheduleRecord`] lines.
pub const SCHEDULE_HEADER: &str = "task,variant,schedule,chunk,N,K,threads,time,checksum";

/// Column names of [`HistogramRecord`] lines.
pub const HISTOGRAM_HEADER: &str = "task,variant,strategy,N,B,threads,time,checksum";

/// Which implementation produced a result.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum Implementation {
    /// The single-threaded reference.
    #[display("seq")]
    Sequential,

    /// The parallel engine on a worker pool.
    #[display("par")]
    Parallel,
}

/// Result of one scheduled loop run.
///
/// Renders as `A,<impl>,<schedule>,<chunk>,<N>,<K>,<threads>,<elapsed_seconds>,<checksum>`.
/// The sequential reference renders its schedule as `none`, its chunk as `0` and its thread
/// count as `1`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScheduleRecord {
    variant: Variant<SchedulePolicy>,
    chunk_size: usize,
    len: usize,
    modulus: usize,
    elapsed: Duration,
    checksum: u64,
}

impl ScheduleRecord {
    /// Describes a run of the sequential reference.
    #[must_use]
    pub fn sequential(len: usize, modulus: usize, elapsed: Duration, checksum: u64) -> Self {
        Self {
            variant: Variant::Sequential,
            chunk_size: 0,
            len,
            modulus,
            elapsed,
            checksum,
        }
    }

    /// Describes a run of the parallel scheduling engine.
    #[must_use]
    #[expect(
        clippy::too_many_arguments,
        reason = "mirrors the record columns one to one"
    )]
    pub fn parallel(
        policy: SchedulePolicy,
        chunk_size: usize,
        len: usize,
        modulus: usize,
        thread_count: usize,
        elapsed: Duration,
        checksum: u64,
    ) -> Self {
        Self {
            variant: Variant::Parallel {
                selector: policy,
                thread_count,
            },
            chunk_size,
            len,
            modulus,
            elapsed,
            checksum,
        }
    }

    /// Returns the implementation that produced the result.
    #[must_use]
    pub fn implementation(&self) -> Implementation {
        self.variant.implementation()
    }

    /// Returns the checksum of the output vector.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        self.checksum
    }
}

impl fmt::Display for ScheduleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A,{},{},{},{},{},{},{:.6},{}",
            self.variant.implementation(),
            self.variant.selector_label(),
            self.chunk_size,
            self.len,
            self.modulus,
            self.variant.thread_count(),
            self.elapsed.as_secs_f64(),
            self.checksum
        )
    }
}

/// Result of one histogram run.
///
/// Renders as `B,<impl>,<strategy>,<N>,<B>,<threads>,<elapsed_seconds>,<checksum>`. The
/// sequential reference renders its strategy as `none` and its thread count as `1`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistogramRecord {
    variant: Variant<SyncStrategy>,
    len: usize,
    bins: usize,
    elapsed: Duration,
    checksum: u64,
}

impl HistogramRecord {
    /// Describes a run of the sequential reference.
    #[must_use]
    pub fn sequential(len: usize, bins: usize, elapsed: Duration, checksum: u64) -> Self {
        Self {
            variant: Variant::Sequential,
            len,
            bins,
            elapsed,
            checksum,
        }
    }

    /// Describes a run of the parallel histogram engine.
    #[must_use]
    pub fn parallel(
        strategy: SyncStrategy,
        len: usize,
        bins: usize,
        thread_count: usize,
        elapsed: Duration,
        checksum: u64,
    ) -> Self {
        Self {
            variant: Variant::Parallel {
                selector: strategy,
                thread_count,
            },
            len,
            bins,
            elapsed,
            checksum,
        }
    }

    /// Returns the implementation that produced the result.
    #[must_use]
    pub fn implementation(&self) -> Implementation {
        self.variant.implementation()
    }

    /// Returns the total of the histogram.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        self.checksum
    }
}

impl fmt::Display for HistogramRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "B,{},{},{},{},{},{:.6},{}",
            self.variant.implementation(),
            self.variant.selector_label(),
            self.len,
            self.bins,
            self.variant.thread_count(),
            self.elapsed.as_secs_f64(),
            self.checksum
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Variant<S> {
    Sequential,
    Parallel { selector: S, thread_count: usize },
}

impl<S: fmt::Display> Variant<S> {
    fn implementation(&self) -> Implementation {
        match self {
            Self::Sequential => Implementation::Sequential,
            Self::Parallel { .. } => Implementation::Parallel,
        }
    }

    fn selector_label(&self) -> String {
        match self {
            Self::Sequential => "none".to_owned(),
            Self::Parallel { selector, .. } => selector.to_string(),
        }
    }

    fn thread_count(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { thread_count, .. } => *thread_count,
        }
    }
}
