//! Runs every scheduling policy and histogram strategy once and prints how long each took
//! next to the sequential reference.

use std::time::Instant;

use par_patterns::{
    Schedule, SchedulePolicy, SyncStrategy, WorkerPool, run_histogram_on, run_scheduled_on,
    samples, sequential,
};

const LEN: usize = 20_000;
const MODULUS: usize = 26;
const SAMPLES: usize = 2_000_000;
const BINS: usize = 256;

fn main() -> Result<(), par_patterns::Error> {
    let mut pool = WorkerPool::new(4)?;

    let start = Instant::now();
    let reference = sequential::run_scheduled(LEN, MODULUS)?;
    println!("sequential loop: {:?}", start.elapsed());

    for policy in SchedulePolicy::ALL {
        let schedule = Schedule::new(policy, 8)?;

        let start = Instant::now();
        let output = run_scheduled_on(&mut pool, LEN, MODULUS, schedule)?;
        let elapsed = start.elapsed();

        assert_eq!(output.checksum(), reference.checksum());
        println!("{policy} loop: {elapsed:?}");
    }

    let samples = samples::generate(SAMPLES, BINS, samples::DEFAULT_SEED)?;

    let start = Instant::now();
    let reference = sequential::run_histogram(&samples, BINS)?;
    println!("sequential histogram: {:?}", start.elapsed());

    for strategy in SyncStrategy::ALL {
        let start = Instant::now();
        let histogram = run_histogram_on(&mut pool, &samples, BINS, strategy)?;
        let elapsed = start.elapsed();

        assert_eq!(histogram, reference);
        println!("{strategy} histogram: {elapsed:?}");
    }

    Ok(())
}
