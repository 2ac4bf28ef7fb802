//! Single-threaded reference implementations of both engines.
//!
//! These run one plain loop on the calling thread. Their results are the oracle the parallel
//! variants are compared against and their run time is the baseline for speedup figures.

use std::num::NonZero;

use crate::error::{require_positive, try_zeroed};
use crate::histogram::{increment, validate_samples};
use crate::{Error, Histogram, Result, WorkloadOutput, workload};

/// Computes `workload(i % modulus)` for every `i` in `0..len` on the calling thread.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `len` or `modulus` is zero and
/// [`Error::Allocation`] if the output vector cannot be allocated.
pub fn run_scheduled(len: usize, modulus: usize) -> Result<WorkloadOutput> {
    require_positive("len", len)?;
    let modulus = NonZero::new(modulus)
        .ok_or_else(|| Error::invalid_argument("modulus", "must be greater than zero"))?;

    let mut values = try_zeroed::<u64>("output vector", len)?;

    for (index, value) in values.iter_mut().enumerate() {
        *value = workload(index % modulus);
    }

    Ok(WorkloadOutput::new(values))
}

/// Counts `samples` into `bins` bins on the calling thread.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `samples` is empty or `bins` is zero,
/// [`Error::SampleOutOfRange`] if any sample is not less than `bins` and
/// [`Error::Allocation`] if the histogram cannot be allocated.
pub fn run_histogram(samples: &[usize], bins: usize) -> Result<Histogram> {
    validate_samples(samples, bins)?;

    let mut counts = try_zeroed::<u64>("histogram", bins)?;

    for sample in samples {
        increment(&mut counts, *sample);
    }

    Ok(Histogram::new(counts))
}
