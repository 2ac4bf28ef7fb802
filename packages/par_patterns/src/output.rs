/// Sums values with wrapping `u64` arithmetic, the checksum used to compare variants.
fn wrapping_sum(values: &[u64]) -> u64 {
    values.iter().fold(0, |sum, value| sum.wrapping_add(*value))
}

/// The output vector of a scheduled loop: one workload value per index, in index order.
///
/// The content depends only on the loop parameters, never on the scheduling policy or the
/// number of workers that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkloadOutput {
    values: Vec<u64>,
}

impl WorkloadOutput {
    pub(crate) fn new(values: Vec<u64>) -> Self {
        Self { values }
    }

    /// Returns the sum of all values, wrapping on overflow.
    ///
    /// Two runs with the same loop parameters always produce the same checksum.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        wrapping_sum(&self.values)
    }

    /// Returns the number of values, which equals the length of the index range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`, as the engines reject empty index ranges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the values in index order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    /// Consumes the output, returning the values in index order.
    #[must_use]
    pub fn into_vec(self) -> Vec<u64> {
        self.values
    }
}

/// Frequency count per bin of a bounded histogram.
///
/// The counts always add up to the number of samples the histogram was built from,
/// regardless of synchronization strategy or thread count.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    pub(crate) fn new(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    /// Returns the sum of all bin counts, i.e. the number of samples.
    #[must_use]
    pub fn total(&self) -> u64 {
        wrapping_sum(&self.counts)
    }

    /// Returns the number of bins.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    /// Returns the count of every bin, in bin order.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Consumes the histogram, returning the count of every bin.
    #[must_use]
    pub fn into_vec(self) -> Vec<u64> {
        self.counts
    }
}
