//! Process-wide pools used when there's no worker to schedule work onto.
//!
//! Each task type gets its own default pool, started the first time it's
//! needed. Default pools are never halted.
use crate::config::Config;
use crate::number_of_cores;
use crate::pool::WorkerPool;
use crate::task::Task;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

static DEFAULTS: Lazy<Mutex<Defaults>> =
    Lazy::new(|| Mutex::new(Defaults::new(Config::from_env())));

struct Defaults {
    /// The configuration used for starting new default pools.
    config: Config,

    /// The default pools started so far, one per task type.
    pools: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Defaults {
    fn new(config: Config) -> Self {
        Defaults { config, pools: HashMap::new() }
    }

    fn pool<T: Task>(&mut self) -> WorkerPool<T> {
        let id = TypeId::of::<T>();

        if let Some(pool) = self
            .pools
            .get(&id)
            .and_then(|pool| pool.downcast_ref::<WorkerPool<T>>())
        {
            return pool.clone();
        }

        // Without a default pool there's nowhere to run the work of code that
        // isn't running on a worker, so there's no sensible way to recover.
        let pool = WorkerPool::with_config(&self.config).unwrap_or_else(|err| {
            panic!("Failed to start the default worker pool: {}", err)
        });

        self.pools.insert(id, Box::new(pool.clone()));
        pool
    }

    fn set_workers(&mut self, workers: usize) -> bool {
        if !self.pools.is_empty() {
            return false;
        }

        self.config.workers =
            if workers > 0 { workers } else { number_of_cores() };

        self.config.verify();
        true
    }
}

/// Returns the default pool for tasks of type `T`, starting it if necessary.
///
/// # Panics
///
/// This function panics if the pool's threads can't be started.
pub fn default_pool<T: Task>() -> WorkerPool<T> {
    DEFAULTS.lock().unwrap().pool::<T>()
}

/// Sets the number of workers to use for default pools.
///
/// If `workers` is zero, one worker per CPU core is used. Once a default pool
/// is started the number of workers can no longer be changed, in which case
/// this function returns `false`.
pub fn set_default_workers(workers: usize) -> bool {
    DEFAULTS.lock().unwrap().set_workers(workers)
}
