#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point that runs one experiment and prints its result records to stdout.
//!
//! Logs go to stderr, filtered through `RUST_LOG` (default `warn`), so stdout only ever
//! carries CSV lines.

use std::io;
use std::num::NonZero;
use std::process::ExitCode;
use std::thread;

use argh::FromArgs;
use par_patterns::harness::{HistogramExperiment, RunError, ScheduleExperiment};
use par_patterns::{SchedulePolicy, SyncStrategy, samples};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Compare loop scheduling policies and histogram synchronization strategies.
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Schedule(ScheduleArgs),
    Histogram(HistogramArgs),
}

/// Compute workload(i % modulus) for every index of a loop.
#[derive(FromArgs)]
#[argh(subcommand, name = "schedule")]
struct ScheduleArgs {
    /// number of loop indices
    #[argh(option)]
    len: usize,

    /// workload argument is the index modulo this value
    #[argh(option)]
    modulus: usize,

    /// scheduling policy (static, dynamic, guided or 1, 2, 3)
    #[argh(option, default = "SchedulePolicy::Static")]
    policy: SchedulePolicy,

    /// chunk size of the dynamic policy or minimum chunk size of the guided policy
    #[argh(option, default = "1")]
    chunk: usize,

    /// number of worker threads (default: available parallelism)
    #[argh(option)]
    threads: Option<usize>,

    /// run the single-threaded reference instead of the parallel engine
    #[argh(switch)]
    sequential: bool,

    /// number of timed repetitions
    #[argh(option, default = "1")]
    repeat: usize,

    /// print the CSV header before the records
    #[argh(switch)]
    header: bool,

    /// compare every result with the single-threaded reference
    #[argh(switch)]
    verify: bool,
}

/// Count random samples into a bounded histogram.
#[derive(FromArgs)]
#[argh(subcommand, name = "histogram")]
struct HistogramArgs {
    /// number of samples
    #[argh(option)]
    len: usize,

    /// number of histogram bins
    #[argh(option)]
    bins: usize,

    /// synchronization strategy (critical, atomic, local or 1, 2, 3)
    #[argh(option, default = "SyncStrategy::Critical")]
    strategy: SyncStrategy,

    /// number of worker threads (default: available parallelism)
    #[argh(option)]
    threads: Option<usize>,

    /// seed of the sample generator
    #[argh(option, default = "samples::DEFAULT_SEED")]
    seed: u64,

    /// run the single-threaded reference instead of the parallel engine
    #[argh(switch)]
    sequential: bool,

    /// number of timed repetitions
    #[argh(option, default = "1")]
    repeat: usize,

    /// print the CSV header before the records
    #[argh(switch)]
    header: bool,

    /// compare every result with the single-threaded reference
    #[argh(switch)]
    verify: bool,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let args: Args = argh::from_env();

    match execute(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg_attr(test, mutants::skip)]
fn execute(command: Command) -> Result<(), RunError> {
    let mut stdout = io::stdout().lock();

    match command {
        Command::Schedule(args) => {
            let experiment = ScheduleExperiment {
                len: args.len,
                modulus: args.modulus,
                policy: args.policy,
                chunk_size: args.chunk,
                thread_count: args.threads.unwrap_or_else(default_thread_count),
                sequential: args.sequential,
                repeat: args.repeat,
                header: args.header,
                verify: args.verify,
            };

            experiment.run(&mut stdout)?;
        }
        Command::Histogram(args) => {
            let experiment = HistogramExperiment {
                len: args.len,
                bins: args.bins,
                strategy: args.strategy,
                thread_count: args.threads.unwrap_or_else(default_thread_count),
                seed: args.seed,
                sequential: args.sequential,
                repeat: args.repeat,
                header: args.header,
                verify: args.verify,
            };

            experiment.run(&mut stdout)?;
        }
    }

    Ok(())
}

fn default_thread_count() -> usize {
    thread::available_parallelism().map_or(1, NonZero::get)
}
