//! Scheduling tasks relative to the code that schedules them.
//!
//! Tasks don't know which worker or pool they run on, so functions in this
//! module use the ambient context of the current thread to decide where new
//! work goes.
use crate::config::Config;
use crate::context::{self, Ambient};
use crate::defaults::default_pool;
use crate::pool::WorkerPool;
use crate::task::Task;
use crate::worker::Worker;

/// Schedules a task near the code calling this function.
///
/// When called from a worker of a pool, the task is scheduled onto that pool.
/// When called from a worker that doesn't belong to a pool, the task is
/// scheduled onto that worker. In all other cases the task is scheduled onto
/// the default pool for tasks of type `T`.
///
/// The return value is `false` if the receiving pool or worker is halted.
pub fn schedule<T: Task>(task: T) -> bool {
    match context::current::<T>() {
        Some(Ambient { pool: Some(pool), .. }) => {
            match WorkerPool::upgrade(&pool) {
                Some(pool) => pool.schedule(task),
                None => {
                    log::trace!("Can't schedule onto a pool that is dropped");
                    false
                }
            }
        }
        Some(Ambient { inbox, .. }) => inbox.send(&task),
        None => {
            log::trace!("Scheduling onto the default pool");
            default_pool::<T>().schedule(task)
        }
    }
}

/// Runs a task on a separate thread, then schedules `continuation` onto the
/// current worker.
///
/// This is meant for tasks that block for a long time (e.g. when waiting for
/// IO), which would otherwise prevent the current worker from running other
/// tasks. The task runs on a new worker, which stops once the task is done.
///
/// The return value is `false` if the current thread isn't a worker, or if
/// the separate thread couldn't be started.
pub fn io<T: Task>(task: T, continuation: Option<T>) -> bool {
    let origin = match context::current::<T>() {
        Some(ambient) => ambient,
        None => return false,
    };

    let index = context::worker_index();
    let stack_size = io_stack_size(&origin);
    let handler = move |task: T| {
        // Work scheduled by the task belongs to the worker that started it,
        // as our own inbox is closed as soon as the task finishes.
        {
            let _scope = context::enter(origin.clone(), index);

            task.apply();
        }

        if let Some(cont) = &continuation {
            if !origin.inbox.send(cont) {
                log::trace!("The worker to resume is halted");
            }
        }

        // The handler runs once, after which the worker stops. We can't halt
        // the worker directly, as it doesn't have access to its own handle.
        if let Some(ambient) = context::current::<T>() {
            ambient.inbox.close();
        }
    };

    let name = "io worker".to_string();
    let worker = match Worker::spawn(name, stack_size, handler, None) {
        Ok(worker) => worker,
        Err(err) => {
            log::error!("Failed to start a worker for an IO task: {}", err);
            return false;
        }
    };

    let sent = worker.send(&task);

    worker.detach();
    sent
}

/// Returns the stack size to use for a worker running an IO task.
///
/// Workers started for pool members use the pool's stack size, others use the
/// stack size from the environment.
fn io_stack_size<T: Task>(origin: &Ambient<T>) -> usize {
    origin
        .pool
        .as_ref()
        .and_then(WorkerPool::upgrade)
        .map_or_else(|| Config::from_env().stack_size, |pool| pool.stack_size())
}
