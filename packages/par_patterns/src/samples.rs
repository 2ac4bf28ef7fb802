//! Deterministic input data for the histogram engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Result;
use crate::error::{require_positive, try_filled};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Generates `len` samples uniformly distributed over `0..bins`.
///
/// The sequence depends only on the arguments: the same seed always yields the same samples,
/// which is what allows results of separate runs to be compared.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`][crate::Error::InvalidArgument] if `len` or `bins` is
/// zero and [`Error::Allocation`][crate::Error::Allocation] if the samples cannot be
/// allocated.
///
/// # Examples
///
/// ```
/// use par_patterns::samples;
///
/// let samples = samples::generate(100, 8, samples::DEFAULT_SEED)?;
///
/// assert_eq!(samples.len(), 100);
/// assert!(samples.iter().all(|sample| *sample < 8));
/// # Ok::<(), par_patterns::Error>(())
/// ```
pub fn generate(len: usize, bins: usize, seed: u64) -> Result<Vec<usize>> {
    require_positive("len", len)?;
    require_positive("bins", bins)?;

    let mut rng = StdRng::seed_from_u64(seed);

    try_filled("sample array", len, || rng.random_range(0..bins))
}
