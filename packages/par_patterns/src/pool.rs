use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::{iter, mem};

use tracing::debug;

use crate::{Error, Result};

/// Fixed-size pool of worker threads that execute one task per worker at a time.
///
/// The pool is created with an exact thread count and never grows or shrinks. Work is
/// submitted with [`broadcast()`][Self::broadcast], which hands a copy of the same task to
/// every worker and waits until all of them have finished. That wait is the barrier that
/// ends every parallel phase of the engines in this crate.
///
/// # Examples
///
/// ```
/// use par_patterns::WorkerPool;
///
/// let mut pool = WorkerPool::new(4)?;
///
/// let squares = pool.broadcast(|worker_index| worker_index * worker_index);
/// assert_eq!(&*squares, &[0, 1, 4, 9]);
/// # Ok::<(), par_patterns::Error>(())
/// ```
///
/// # Lifecycle
///
/// Dropping the pool will wait for all threads to finish executing their tasks.
#[derive(Debug)]
pub struct WorkerPool {
    command_txs: Vec<mpsc::Sender<Command>>,
    join_handles: Vec<JoinHandle<()>>,
    thread_count: NonZero<usize>,
}

impl WorkerPool {
    /// Creates a pool with exactly `thread_count` worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `thread_count` is zero and
    /// [`Error::WorkerSpawn`] if the operating system refuses to create a thread.
    pub fn new(thread_count: usize) -> Result<Self> {
        let thread_count = NonZero::new(thread_count).ok_or_else(|| {
            Error::invalid_argument("thread_count", "must be greater than zero")
        })?;

        let mut command_txs = Vec::with_capacity(thread_count.get());
        let mut join_handles = Vec::with_capacity(thread_count.get());

        for worker_index in 0..thread_count.get() {
            let (tx, rx) = mpsc::channel();

            // If spawning fails part way, the senders created so far are dropped on return,
            // which ends the worker loop of every thread that did start.
            let handle = thread::Builder::new()
                .name(format!("par-worker-{worker_index}"))
                .spawn(move || {
                    debug!(worker_index, "worker thread started");
                    worker_entrypoint(&rx);
                    debug!(worker_index, "worker thread exiting");
                })
                .map_err(Error::WorkerSpawn)?;

            command_txs.push(tx);
            join_handles.push(handle);
        }

        Ok(Self {
            command_txs,
            join_handles,
            thread_count,
        })
    }

    /// Returns the number of threads in the pool.
    #[must_use]
    pub fn thread_count(&self) -> NonZero<usize> {
        self.thread_count
    }

    /// Executes a task on all threads in the pool, waiting for all threads to complete
    /// and returning one result per worker, ordered by worker index.
    ///
    /// Each worker receives its own clone of `f` and calls it with its worker index, which is
    /// in `0..thread_count`.
    ///
    /// The task may borrow from the caller's stack because this method does not return until
    /// every worker is done with it.
    ///
    /// # Panics
    ///
    /// If the task panics on any worker, the panic is resumed on the calling thread after
    /// every worker has finished.
    #[cfg_attr(test, mutants::skip)] // If work does not get enqueued, deadlocks are very easy.
    #[expect(
        clippy::needless_pass_by_ref_mut,
        reason = "protects users from deadlock through concurrent usage"
    )]
    pub fn broadcast<'f, F, R>(&mut self, f: F) -> Box<[R]>
    where
        F: FnOnce(usize) -> R + Clone + Send + 'f,
        R: Send + 'static,
    {
        // This requires a `&mut` exclusive reference because two concurrent broadcasts on the
        // same pool would interleave their tasks on the workers and wait on each other.

        let (result_txs, result_rxs): (Vec<_>, Vec<_>) =
            iter::repeat_with(oneshot::channel::<TaskOutcome<R>>)
                .take(self.thread_count.get())
                .unzip();

        for (worker_index, (command_tx, result_tx)) in
            self.command_txs.iter().zip(result_txs).enumerate()
        {
            let f: Box<dyn FnOnce(usize) -> R + Send + 'f> = Box::new(f.clone());

            // SAFETY: Every worker sends exactly one outcome per task, even if the task panics,
            // and we receive all of those outcomes below before returning. Anything `f` borrows
            // therefore outlives every use of it, so pretending it is 'static is sound.
            let f = unsafe {
                mem::transmute::<
                    Box<dyn FnOnce(usize) -> R + Send + 'f>,
                    Box<dyn FnOnce(usize) -> R + Send + 'static>,
                >(f)
            };

            command_tx
                .send(Command::Execute(Box::new(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(worker_index)));

                    result_tx.send(outcome).expect(
                        "receiver must still exist - this is mandatory for scoped lifetime logic",
                    );
                })))
                .expect("worker thread must still exist - pool cannot operate without workers");
        }

        let mut results = Vec::with_capacity(self.thread_count.get());
        let mut first_panic = None;

        for rx in result_rxs {
            match rx
                .recv()
                .expect("worker threads catch task panics and always send an outcome")
            {
                Ok(result) => results.push(result),
                Err(payload) => {
                    first_panic.get_or_insert(payload);
                }
            }
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }

        results.into_boxed_slice()
    }
}

impl Drop for WorkerPool {
    #[cfg_attr(test, mutants::skip)] // Impractical to test that stuff stops happening.
    fn drop(&mut self) {
        if thread::panicking() {
            // If the thread is panicking, we are probably in a dirty state and shutting down
            // may make the problem worse by hiding the original panic, so just do nothing.
            return;
        }

        for tx in self.command_txs.drain(..) {
            // A worker that is already gone has nothing to shut down.
            drop(tx.send(Command::Shutdown));
        }

        for handle in self.join_handles.drain(..) {
            if let Err(payload) = handle.join() {
                // Tasks run inside a panic trap, so a worker can only die from a pool bug.
                panic::resume_unwind(payload);
            }
        }
    }
}

type TaskOutcome<R> = thread::Result<R>;

enum Command {
    Execute(Box<dyn FnOnce() + Send>),
    Shutdown,
}

#[cfg_attr(test, mutants::skip)] // Impractical to test that things do not happen when worker function is missing.
fn worker_entrypoint(rx: &mpsc::Receiver<Command>) {
    while let Ok(Command::Execute(f)) = rx.recv() {
        f();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{self, AtomicUsize};
    use std::sync::{Arc, Mutex};

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(WorkerPool: Send);

    #[test]
    fn zero_threads_is_rejected() {
        let error = WorkerPool::new(0).unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidArgument {
                name: "thread_count",
                ..
            }
        ));
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn every_worker_runs_the_task_once() {
        let mut pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.thread_count().get(), 4);

        let counter = Arc::new(AtomicUsize::new(0));

        pool.broadcast({
            let counter = Arc::clone(&counter);
            move |_| {
                counter.fetch_add(1, atomic::Ordering::SeqCst);
            }
        });

        assert_eq!(counter.load(atomic::Ordering::SeqCst), 4);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn results_are_ordered_by_worker_index() {
        let mut pool = WorkerPool::new(8).unwrap();

        let results = pool.broadcast(|worker_index| worker_index);

        assert_eq!(&*results, &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn task_may_borrow_from_caller() {
        let mut pool = WorkerPool::new(3).unwrap();
        let values = vec![10_u64, 20, 30];
        let seen = Mutex::new(Vec::new());

        pool.broadcast(|worker_index| {
            seen.lock().unwrap().push(values[worker_index]);
        });

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, values);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn pool_is_reusable() {
        let mut pool = WorkerPool::new(2).unwrap();

        for round in 0..10_usize {
            let results = pool.broadcast(move |worker_index| round + worker_index);
            assert_eq!(&*results, &[round, round + 1]);
        }
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn workers_are_named() {
        let mut pool = WorkerPool::new(2).unwrap();

        let names = pool.broadcast(|_| thread::current().name().map(str::to_owned));

        assert_eq!(
            &*names,
            &[
                Some("par-worker-0".to_owned()),
                Some("par-worker-1".to_owned())
            ]
        );
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    #[should_panic(expected = "worker 1 failed")]
    fn task_panic_is_resumed_on_caller() {
        let mut pool = WorkerPool::new(2).unwrap();

        pool.broadcast(|worker_index| {
            assert!(worker_index != 1, "worker {worker_index} failed");
        });
    }
}
