//! Bounded worker pool with caller-runs backpressure.
//!
//! Jobs are handed directly to an idle worker. When every
//! worker is busy the submitting thread runs the job
//! itself, so the number of jobs in flight never exceeds
//! the pool size and nothing queues up behind a slow
//! worker.

use std::sync::Arc;
use std::time::Duration;

use log::error;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{Error, Result};

/// How a job was run by [`WorkerPool::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Worker,
    Inline,
}

#[derive(Debug, Default)]
struct Slots {
    busy: Mutex<usize>,
    idle: Condvar,
}

/// Frees a slot when the job holding it ends, even by
/// panicking.
struct Permit(Arc<Slots>);

impl Drop for Permit {
    fn drop(&mut self) {
        let mut busy = self.0.busy.lock();
        *busy -= 1;
        self.0.idle.notify_all();
    }
}

pub struct WorkerPool {
    pool: ThreadPool,
    capacity: usize,
    slots: Arc<Slots>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tilemix-worker-{}", i))
            .panic_handler(|_| error!("worker panicked"))
            .build()?;
        Ok(WorkerPool {
            pool,
            capacity: workers,
            slots: Default::default(),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently running on workers.
    pub fn busy(&self) -> usize {
        *self.slots.busy.lock()
    }

    /// Run `job` on a worker if one is free, or else on the
    /// calling thread before returning.
    pub fn execute<F>(&self, job: F) -> Dispatch
    where
        F: FnOnce() + Send + 'static,
    {
        let permit = {
            let mut busy = self.slots.busy.lock();
            if *busy < self.capacity {
                *busy += 1;
                Some(Permit(self.slots.clone()))
            } else {
                None
            }
        };

        match permit {
            Some(permit) => {
                self.pool.spawn(move || {
                    let _permit = permit;
                    job();
                });
                Dispatch::Worker
            }
            None => {
                job();
                Dispatch::Inline
            }
        }
    }

    /// Wait until no job is running on the workers.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        let mut busy = self.slots.busy.lock();
        let waited = self
            .slots
            .idle
            .wait_while_for(&mut busy, |busy| *busy > 0, timeout);
        if waited.timed_out() && *busy > 0 {
            return Err(Error::DrainTimeout(timeout));
        }
        Ok(())
    }
}
