#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Parallel loop scheduling and histogram construction on a fixed-size worker pool.
//!
//! This package contains two small parallel engines that are meant to be compared against each
//! other and against a single-threaded reference:
//!
//! * The scheduling engine computes `workload(i % modulus)` for every index of a loop,
//!   distributing the indices across workers with a [`SchedulePolicy`]. The workload has
//!   wildly uneven cost per index, which makes the difference between the policies observable.
//! * The histogram engine counts samples into a bounded number of bins, making concurrent
//!   increments safe with a [`SyncStrategy`].
//!
//! Both engines run on a [`WorkerPool`] with an exact, caller-chosen thread count and produce
//! results that are identical to the [`sequential`] reference for every policy, strategy and
//! thread count. Results carry a checksum ([`WorkloadOutput::checksum()`],
//! [`Histogram::total()`]) that makes this easy to compare across runs.
//!
//! The [`harness`] and [`record`] modules wrap the engines into timed experiments that emit one
//! CSV line per run, which is what the `par_patterns` binary prints.
//!
//! # Scheduling policies
//!
//! | Policy                       | Distribution                                                  |
//! |------------------------------|---------------------------------------------------------------|
//! | [`SchedulePolicy::Static`]   | One contiguous block per worker, fixed before the loop starts |
//! | [`SchedulePolicy::Dynamic`]  | Fixed-size chunks claimed from a shared atomic cursor         |
//! | [`SchedulePolicy::Guided`]   | Chunks claimed from the cursor that shrink as work runs out   |
//!
//! # Example
//!
//! ```
//! use par_patterns::{SchedulePolicy, SyncStrategy, run_histogram, run_scheduled, samples};
//!
//! let output = run_scheduled(1_000, 20, SchedulePolicy::Guided, 8, 4)?;
//! assert_eq!(output.len(), 1_000);
//!
//! let samples = samples::generate(1_000, 16, samples::DEFAULT_SEED)?;
//! let histogram = run_histogram(&samples, 16, SyncStrategy::Atomic, 4)?;
//! assert_eq!(histogram.total(), 1_000);
//! # Ok::<(), par_patterns::Error>(())
//! ```

mod error;
mod histogram;
mod output;
mod partition;
mod pool;
mod schedule;
mod workload;

pub mod harness;
pub mod record;
pub mod samples;
pub mod sequential;

pub use error::{Error, Result};
pub use histogram::*;
pub use output::*;
pub use pool::*;
pub use schedule::*;
pub use workload::*;
