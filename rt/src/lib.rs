#![allow(clippy::new_without_default)]

pub mod channel;
pub mod config;
pub mod context;
pub mod continuation;
pub mod dispatch;
pub mod job;
pub mod pool;
pub mod task;
pub mod worker;

mod defaults;
mod notifier;

#[cfg(test)]
pub(crate) mod test;

pub use crate::channel::Channel;
pub use crate::config::Config;
pub use crate::context::{in_pool, in_worker, worker_index};
pub use crate::continuation::Continuation;
pub use crate::defaults::{default_pool, set_default_workers};
pub use crate::dispatch::{io, schedule};
pub use crate::job::Job;
pub use crate::pool::WorkerPool;
pub use crate::task::Task;
pub use crate::worker::{Worker, WorkerState};

use std::thread::available_parallelism;

/// Returns the number of CPU cores available to the current process.
pub(crate) fn number_of_cores() -> usize {
    available_parallelism().map(|v| v.into()).unwrap_or(1)
}
