//! Running tasks using a fixed number of workers.
//!
//! A pool distributes its tasks over its workers in a round-robin fashion: a
//! cursor points to the worker to use for the next task, and advances to the
//! next worker after every task. Scheduling N tasks onto a pool of N workers
//! thus results in every worker receiving exactly one task, regardless of how
//! fast the workers process their tasks.
//!
//! Workers don't steal work from each other. A worker that is slow to process
//! its tasks keeps receiving its share of new tasks.
//!
//! ## Dead workers
//!
//! Workers whose thread terminated due to a panicking task aren't replaced.
//! The cursor skips such workers, reducing the capacity of the pool.
use crate::config::Config;
use crate::context;
use crate::task::Task;
use crate::worker::{apply, Member, Worker};
use std::io;
use std::ptr;
use std::sync::{Arc, Mutex, Weak};

/// A reference to a pool that doesn't keep it alive.
///
/// Workers use these to refer to the pool they belong to, as a strong
/// reference would prevent a pool from ever being dropped.
pub(crate) type WeakPool<T> = Weak<Shared<T>>;

pub(crate) struct Shared<T: Task> {
    workers: Vec<Worker<T>>,

    /// The index of the worker to schedule the next task onto.
    cursor: Mutex<usize>,

    /// The stack size of the workers, in bytes.
    stack_size: usize,
}

impl<T: Task> Shared<T> {
    fn halt(&self) {
        for worker in &self.workers {
            worker.close();
        }

        // Other members may be halting the pool at the same time, waiting for
        // us to finish. Joining is left to whoever owns the pool.
        if self.is_member() {
            return;
        }

        for worker in &self.workers {
            worker.halt();
        }
    }

    /// Returns `true` if the current thread is one of our workers.
    fn is_member(&self) -> bool {
        context::current::<T>()
            .and_then(|ambient| ambient.pool)
            .map_or(false, |pool| ptr::eq(pool.as_ptr(), self))
    }
}

impl<T: Task> Drop for Shared<T> {
    fn drop(&mut self) {
        self.halt();
    }
}

/// A pool of workers, each applying the tasks they receive.
pub struct WorkerPool<T: Task> {
    shared: Arc<Shared<T>>,
}

impl<T: Task> WorkerPool<T> {
    /// Starts a pool with the given number of workers.
    ///
    /// If `workers` is zero, one worker per CPU core is started.
    pub fn start(workers: usize) -> io::Result<Self> {
        let mut config = Config::new();

        if workers > 0 {
            config.workers = workers;
        }

        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> io::Result<Self> {
        let mut config = config.clone();
        let mut error = None;

        config.verify();

        let shared = Arc::new_cyclic(|pool: &WeakPool<T>| {
            let mut workers = Vec::with_capacity(config.workers);

            for index in 0..config.workers {
                let member = Member { index, pool: pool.clone() };
                let result = Worker::spawn(
                    format!("pool worker {}", index),
                    config.stack_size,
                    apply::<T>,
                    Some(member),
                );

                match result {
                    Ok(worker) => workers.push(worker),
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                }
            }

            Shared {
                workers,
                cursor: Mutex::new(0),
                stack_size: config.stack_size,
            }
        });

        if let Some(err) = error {
            // Dropping the pool halts the workers started so far.
            drop(shared);
            return Err(err);
        }

        log::debug!("Started a pool with {} workers", config.workers);
        Ok(WorkerPool { shared })
    }

    pub(crate) fn upgrade(pool: &WeakPool<T>) -> Option<Self> {
        pool.upgrade().map(|shared| WorkerPool { shared })
    }

    /// Schedules a task onto the next worker.
    ///
    /// The return value is `false` if none of the workers accepted the task,
    /// which happens once the pool is halted.
    pub fn schedule(&self, task: T) -> bool {
        let workers = &self.shared.workers;

        // The lock is held while sending the task, ensuring tasks end up in
        // the inboxes in the same order as the cursor moves. This doesn't
        // block for long, as inboxes are unbounded.
        let mut cursor = self.shared.cursor.lock().unwrap();

        for _ in 0..workers.len() {
            let worker = &workers[*cursor];

            *cursor = (*cursor + 1) % workers.len();

            if worker.send(&task) {
                return true;
            }
        }

        false
    }

    /// Returns the number of workers in the pool, including any that are
    /// halted.
    pub fn worker_count(&self) -> usize {
        self.shared.workers.len()
    }

    /// Returns the number of workers still running.
    pub fn alive_workers(&self) -> usize {
        self.shared.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Halts all workers, blocking until their threads finished running.
    ///
    /// Tasks scheduled but not yet received by a worker are discarded. When
    /// called by a task running on one of the pool's workers, the workers are
    /// told to stop but this method doesn't wait for them.
    pub fn halt_all(&self) {
        self.shared.halt();
        log::debug!("Halted a pool of {} workers", self.worker_count());
    }

    pub(crate) fn stack_size(&self) -> usize {
        self.shared.stack_size
    }

    /// Returns `true` if both handles refer to the same pool.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Task> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        WorkerPool { shared: self.shared.clone() }
    }
}
