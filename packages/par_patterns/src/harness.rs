//! Timed experiment runs that emit result records.
//!
//! An experiment owns its parameters, creates the worker pool once, then performs the
//! requested number of timed repetitions on that pool. Only the engine call itself is timed:
//! pool creation, sample generation and verification against the sequential reference all
//! happen outside the timed region.

use std::io::{self, Write};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error};

use crate::error::require_positive;
use crate::record::{HISTOGRAM_HEADER, HistogramRecord, SCHEDULE_HEADER, ScheduleRecord};
use crate::{
    Schedule, SchedulePolicy, SyncStrategy, WorkerPool, run_histogram_on, run_scheduled_on,
    samples, sequential,
};

/// Errors that can end an experiment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The engine rejected the parameters or could not obtain its resources.
    #[error(transparent)]
    Engine(#[from] crate::Error),

    /// A result record could not be written.
    #[error("failed to write result record")]
    Output(#[from] io::Error),

    /// The parallel result differs from the sequential reference.
    #[error(
        "{what} differs from the sequential reference at position {position}: expected {expected}, got {actual}"
    )]
    Mismatch {
        /// Which result was compared.
        what: &'static str,

        /// First position at which the results differ.
        position: usize,

        /// Value produced by the sequential reference.
        expected: u64,

        /// Value produced by the parallel engine.
        actual: u64,
    },
}

/// Parameters of a scheduled loop experiment.
#[derive(Clone, Debug)]
pub struct ScheduleExperiment {
    /// Number of loop indices.
    pub len: usize,

    /// Every index `i` computes `workload(i % modulus)`.
    pub modulus: usize,

    /// Scheduling policy of the parallel engine.
    pub policy: SchedulePolicy,

    /// Chunk size for the dynamic policy, minimum chunk size for the guided policy.
    pub chunk_size: usize,

    /// Number of pool workers.
    pub thread_count: usize,

    /// Runs the sequential reference instead of the parallel engine.
    pub sequential: bool,

    /// Number of timed repetitions, one record each.
    pub repeat: usize,

    /// Writes the CSV header before the first record.
    pub header: bool,

    /// Compares every parallel result with the sequential reference.
    pub verify: bool,
}

impl ScheduleExperiment {
    /// Performs the experiment, writing one record per repetition to `out`.
    ///
    /// Returns the records that were written.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Engine`] if the parameters are invalid or resources cannot be
    /// obtained, [`RunError::Output`] if writing fails and [`RunError::Mismatch`] if
    /// verification is enabled and a parallel result differs from the sequential reference.
    pub fn run(&self, out: &mut impl Write) -> Result<Vec<ScheduleRecord>, RunError> {
        let repeat = require_positive("repeat", self.repeat)?;

        if self.header {
            writeln!(out, "{SCHEDULE_HEADER}")?;
        }

        let mut records = Vec::with_capacity(repeat);

        if self.sequential {
            for _ in 0..repeat {
                let start = Instant::now();
                let output = sequential::run_scheduled(self.len, self.modulus)?;
                let elapsed = start.elapsed();

                let record =
                    ScheduleRecord::sequential(self.len, self.modulus, elapsed, output.checksum());
                writeln!(out, "{record}")?;
                records.push(record);
            }

            return Ok(records);
        }

        let schedule = Schedule::new(self.policy, self.chunk_size)?;
        let mut pool = WorkerPool::new(self.thread_count)?;

        let reference = if self.verify {
            Some(sequential::run_scheduled(self.len, self.modulus)?)
        } else {
            None
        };

        for _ in 0..repeat {
            let start = Instant::now();
            let output = run_scheduled_on(&mut pool, self.len, self.modulus, schedule)?;
            let elapsed = start.elapsed();

            if let Some(reference) = &reference {
                verify("output vector", reference.as_slice(), output.as_slice())?;
            }

            let record = ScheduleRecord::parallel(
                self.policy,
                self.chunk_size,
                self.len,
                self.modulus,
                pool.thread_count().get(),
                elapsed,
                output.checksum(),
            );
            writeln!(out, "{record}")?;
            records.push(record);
        }

        Ok(records)
    }
}

/// Parameters of a histogram experiment.
#[derive(Clone, Debug)]
pub struct HistogramExperiment {
    /// Number of samples.
    pub len: usize,

    /// Number of histogram bins.
    pub bins: usize,

    /// Synchronization strategy of the parallel engine.
    pub strategy: SyncStrategy,

    /// Number of pool workers.
    pub thread_count: usize,

    /// Seed of the sample generator.
    pub seed: u64,

    /// Runs the sequential reference instead of the parallel engine.
    pub sequential: bool,

    /// Number of timed repetitions, one record each.
    pub repeat: usize,

    /// Writes the CSV header before the first record.
    pub header: bool,

    /// Compares every parallel result with the sequential reference.
    pub verify: bool,
}

impl HistogramExperiment {
    /// Generates the samples once, then performs the experiment, writing one record per
    /// repetition to `out`.
    ///
    /// Returns the records that were written.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Engine`] if the parameters are invalid or resources cannot be
    /// obtained, [`RunError::Output`] if writing fails and [`RunError::Mismatch`] if
    /// verification is enabled and a parallel result differs from the sequential reference.
    pub fn run(&self, out: &mut impl Write) -> Result<Vec<HistogramRecord>, RunError> {
        let repeat = require_positive("repeat", self.repeat)?;
        let samples = samples::generate(self.len, self.bins, self.seed)?;

        if self.header {
            writeln!(out, "{HISTOGRAM_HEADER}")?;
        }

        let mut records = Vec::with_capacity(repeat);

        if self.sequential {
            for _ in 0..repeat {
                let start = Instant::now();
                let histogram = sequential::run_histogram(&samples, self.bins)?;
                let elapsed = start.elapsed();

                let record =
                    HistogramRecord::sequential(self.len, self.bins, elapsed, histogram.total());
                writeln!(out, "{record}")?;
                records.push(record);
            }

            return Ok(records);
        }

        let mut pool = WorkerPool::new(self.thread_count)?;

        let reference = if self.verify {
            Some(sequential::run_histogram(&samples, self.bins)?)
        } else {
            None
        };

        for _ in 0..repeat {
            let start = Instant::now();
            let histogram = run_histogram_on(&mut pool, &samples, self.bins, self.strategy)?;
            let elapsed = start.elapsed();

            if let Some(reference) = &reference {
                verify("histogram", reference.counts(), histogram.counts())?;
            }

            let record = HistogramRecord::parallel(
                self.strategy,
                self.len,
                self.bins,
                pool.thread_count().get(),
                elapsed,
                histogram.total(),
            );
            writeln!(out, "{record}")?;
            records.push(record);
        }

        Ok(records)
    }
}

/// Compares a parallel result with the sequential reference, element by element.
fn verify(what: &'static str, expected: &[u64], actual: &[u64]) -> Result<(), RunError> {
    let first_difference = expected
        .iter()
        .zip(actual)
        .enumerate()
        .find(|(_, (expected, actual))| expected != actual);

    if let Some((position, (expected, actual))) = first_difference {
        error!(what, position, expected, actual, "result differs from sequential reference");

        return Err(RunError::Mismatch {
            what,
            position,
            expected: *expected,
            actual: *actual,
        });
    }

    if expected.len() != actual.len() {
        error!(
            what,
            expected_len = expected.len(),
            actual_len = actual.len(),
            "result length differs from sequential reference"
        );

        let position = expected.len().min(actual.len());

        return Err(RunError::Mismatch {
            what,
            position,
            expected: expected.get(position).copied().unwrap_or_default(),
            actual: actual.get(position).copied().unwrap_or_default(),
        });
    }

    debug!(what, len = expected.len(), "result matches sequential reference");

    Ok(())
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    assert_impl_all!(RunError: Send, Sync);

    fn schedule_experiment() -> ScheduleExperiment {
        ScheduleExperiment {
            len: 20,
            modulus: 10,
            policy: SchedulePolicy::Static,
            chunk_size: 1,
            thread_count: 4,
            sequential: false,
            repeat: 1,
            header: false,
            verify: true,
        }
    }

    fn histogram_experiment() -> HistogramExperiment {
        HistogramExperiment {
            len: 1_000,
            bins: 16,
            strategy: SyncStrategy::Critical,
            thread_count: 4,
            seed: samples::DEFAULT_SEED,
            sequential: false,
            repeat: 1,
            header: false,
            verify: true,
        }
    }

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Real threads are too slow under Miri.
    fn schedule_writes_one_record_per_repetition() {
        let experiment = ScheduleExperiment {
            repeat: 3,
            header: true,
            ..schedule_experiment()
        };

        let mut out = Vec::new();
        let records = experiment.run(&mut out).unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.first().unwrap(), SCHEDULE_HEADER);

        assert_eq!(records.len(), 3);
        for (record, line) in records.iter().zip(lines.iter().skip(1)) {
            assert_eq!(record.to_string(), *line);
            assert!(line.starts_with("A,par,static,1,20,10,4,"));
            assert!(line.ends_with(",176"));
        }
    }

    #[test]
    fn schedule_sequential_record() {
        let experiment = ScheduleExperiment {
            sequential: true,
            ..schedule_experiment()
        };

        let mut out = Vec::new();
        experiment.run(&mut out).unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 1);
        assert!(lines.first().unwrap().starts_with("A,seq,none,0,20,10,1,"));
        assert!(lines.first().unwrap().ends_with(",176"));
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Real threads are too slow under Miri.
    fn schedule_every_policy_passes_verification() {
        for policy in SchedulePolicy::ALL {
            let experiment = ScheduleExperiment {
                len: 500,
                modulus: 25,
                policy,
                chunk_size: 7,
                ..schedule_experiment()
            };

            experiment.run(&mut io::sink()).unwrap();
        }
    }

    #[test]
    fn schedule_zero_repeat_is_rejected() {
        let experiment = ScheduleExperiment {
            repeat: 0,
            header: true,
            ..schedule_experiment()
        };

        let mut out = Vec::new();
        let error = experiment.run(&mut out).unwrap_err();

        assert!(matches!(
            error,
            RunError::Engine(Error::InvalidArgument { name: "repeat", .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn schedule_invalid_chunk_is_rejected_before_output() {
        let experiment = ScheduleExperiment {
            policy: SchedulePolicy::Dynamic,
            chunk_size: 0,
            ..schedule_experiment()
        };

        let mut out = Vec::new();
        let error = experiment.run(&mut out).unwrap_err();

        assert!(matches!(
            error,
            RunError::Engine(Error::InvalidArgument {
                name: "chunk_size",
                ..
            })
        ));
        assert!(out.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Real threads are too slow under Miri.
    fn histogram_every_strategy_counts_every_sample() {
        for strategy in SyncStrategy::ALL {
            let experiment = HistogramExperiment {
                strategy,
                ..histogram_experiment()
            };

            let mut out = Vec::new();
            let records = experiment.run(&mut out).unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(records.first().unwrap().checksum(), 1_000);

            let expected_prefix = format!("B,par,{strategy},1000,16,4,");
            let lines = lines(&out);
            assert!(lines.first().unwrap().starts_with(&expected_prefix));
            assert!(lines.first().unwrap().ends_with(",1000"));
        }
    }

    #[test]
    fn histogram_sequential_with_header() {
        let experiment = HistogramExperiment {
            sequential: true,
            header: true,
            repeat: 2,
            ..histogram_experiment()
        };

        let mut out = Vec::new();
        experiment.run(&mut out).unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.first().unwrap(), HISTOGRAM_HEADER);
        assert!(lines.get(1).unwrap().starts_with("B,seq,none,1000,16,1,"));
        assert!(lines.get(2).unwrap().ends_with(",1000"));
    }

    #[test]
    fn histogram_zero_bins_is_rejected() {
        let experiment = HistogramExperiment {
            bins: 0,
            ..histogram_experiment()
        };

        let error = experiment.run(&mut io::sink()).unwrap_err();

        assert!(matches!(
            error,
            RunError::Engine(Error::InvalidArgument { name: "bins", .. })
        ));
    }

    #[test]
    fn histogram_zero_threads_is_rejected() {
        let experiment = HistogramExperiment {
            thread_count: 0,
            ..histogram_experiment()
        };

        let error = experiment.run(&mut io::sink()).unwrap_err();

        assert!(matches!(
            error,
            RunError::Engine(Error::InvalidArgument {
                name: "thread_count",
                ..
            })
        ));
    }

    #[test]
    fn verify_accepts_identical_results() {
        verify("test", &[1, 2, 3], &[1, 2, 3]).unwrap();
    }

    #[test]
    fn verify_reports_first_difference() {
        let error = verify("test", &[1, 2, 3, 4], &[1, 2, 5, 6]).unwrap_err();

        assert!(matches!(
            error,
            RunError::Mismatch {
                what: "test",
                position: 2,
                expected: 3,
                actual: 5
            }
        ));
        assert_eq!(
            error.to_string(),
            "test differs from the sequential reference at position 2: expected 3, got 5"
        );
    }

    #[test]
    fn verify_reports_length_difference() {
        let error = verify("test", &[1, 2], &[1, 2, 7]).unwrap_err();

        assert!(matches!(
            error,
            RunError::Mismatch {
                position: 2,
                expected: 0,
                actual: 7,
                ..
            }
        ));
    }
}
