//! Threads running the tasks sent to their private inbox.
//!
//! A worker owns a single OS thread and an unbounded channel, its inbox. The
//! thread receives tasks from the inbox and passes them to the worker's
//! handler, until the inbox is closed.
//!
//! ## Halting
//!
//! Halting a worker closes its inbox, discarding any tasks not yet received,
//! then waits for the thread to finish the task it's running (if any). Tasks
//! are never interrupted.
//!
//! Halting is done explicitly using `Worker::halt()`, or implicitly when the
//! last handle to a worker is dropped.
//!
//! ## Panics
//!
//! Panics produced by handlers aren't caught: the panic terminates the worker's
//! thread. The worker is then considered halted, its inbox is closed so
//! scheduling more work onto it fails, and halting it won't block. Workers
//! aren't restarted.
use crate::channel::Channel;
use crate::config::DEFAULT_STACK_SIZE;
use crate::context::{self, Ambient};
use crate::notifier::Signal;
use crate::pool::WeakPool;
use crate::task::Task;
use backtrace::Backtrace;
use crossbeam_utils::atomic::AtomicCell;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Builder, JoinHandle, ThreadId};

/// The state a worker is in.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum WorkerState {
    /// The thread is spawned but not yet receiving tasks.
    Starting,

    /// The thread is receiving and running tasks.
    Running,

    /// The inbox is closed, but the thread may still be running a task.
    Halting,

    /// The thread finished running.
    Halted,
}

/// The data shared between a worker and its thread.
struct Control<T> {
    inbox: Channel<T>,
    state: AtomicCell<WorkerState>,

    /// Raised by the thread when it's ready to receive tasks.
    ready: Signal,

    /// Raised by the thread when it stops, including when a task panics.
    done: Signal,
}

/// The pool a worker belongs to.
pub(crate) struct Member<T: Task> {
    /// The index of the worker in the pool.
    pub(crate) index: usize,
    pub(crate) pool: WeakPool<T>,
}

struct Inner<T: Task> {
    control: Arc<Control<T>>,
    name: String,

    /// The handle used for joining the thread, taken by the first caller of
    /// `halt()`.
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,

    /// When set, releasing the last handle doesn't halt the worker.
    detached: AtomicBool,
}

impl<T: Task> Inner<T> {
    fn close(&self) {
        let control = &self.control;

        // The result is ignored, because the worker may already be halting, or
        // its thread may have terminated due to a panic.
        let _ = control
            .state
            .compare_exchange(WorkerState::Running, WorkerState::Halting);

        control.inbox.close();
    }

    fn halt(&self) {
        let control = &self.control;

        self.close();

        // A task may halt the worker it runs on, in which case we can't wait
        // for ourselves. The loop terminates once the task finishes.
        if thread::current().id() == self.thread_id {
            return;
        }

        control.done.wait();

        let handle = self.thread.lock().unwrap().take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("Worker '{}' was terminated by a panic", self.name);
            } else {
                log::debug!("Worker '{}' halted", self.name);
            }
        }
    }
}

impl<T: Task> Drop for Inner<T> {
    fn drop(&mut self) {
        if !self.detached.load(Ordering::Acquire) {
            self.halt();
        }
    }
}

/// Marks a worker as halted when its thread stops, whether it stops normally
/// or due to a panic.
struct Exit<'a, T: Task> {
    control: &'a Control<T>,
}

impl<'a, T: Task> Drop for Exit<'a, T> {
    fn drop(&mut self) {
        let name = thread::current().name().unwrap_or("").to_string();

        if thread::panicking() {
            log::error!(
                "A task panicked on worker '{}', the worker is stopping\n{:?}",
                name,
                Backtrace::new()
            );
        }

        self.control.inbox.close();
        self.control.state.store(WorkerState::Halted);
        self.control.done.raise();
    }
}

/// A thread running tasks from a private inbox.
pub struct Worker<T: Task> {
    inner: Arc<Inner<T>>,
}

impl<T: Task> Worker<T> {
    /// Starts a worker that applies every task it receives.
    pub fn start() -> io::Result<Self> {
        Self::new(apply::<T>)
    }

    /// Starts a worker that passes every task it receives to `handler`.
    ///
    /// This method returns once the worker is ready to receive tasks.
    pub fn new<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(T) + Send + 'static,
    {
        Self::spawn("worker".to_string(), DEFAULT_STACK_SIZE, handler, None)
    }

    pub(crate) fn spawn<F>(
        name: String,
        stack_size: usize,
        handler: F,
        member: Option<Member<T>>,
    ) -> io::Result<Self>
    where
        F: Fn(T) + Send + 'static,
    {
        let control = Arc::new(Control {
            inbox: Channel::unbounded(),
            state: AtomicCell::new(WorkerState::Starting),
            ready: Signal::new(),
            done: Signal::new(),
        });

        let thread_control = control.clone();
        let handle = Builder::new()
            .name(name.clone())
            .stack_size(stack_size)
            .spawn(move || {
                let control = thread_control;
                let (index, pool) = match member {
                    Some(member) => (Some(member.index), Some(member.pool)),
                    None => (None, None),
                };

                // The order matters: the ambient context must be restored
                // before the owner is told we're done.
                let _exit = Exit { control: &control };
                let _scope = context::enter(
                    Ambient { inbox: control.inbox.clone(), pool },
                    index,
                );

                let _ = control.state.compare_exchange(
                    WorkerState::Starting,
                    WorkerState::Running,
                );

                control.ready.raise();

                while let Some(task) = control.inbox.recv() {
                    handler(task);
                }
            })?;

        control.ready.wait();
        log::debug!("Worker '{}' started", name);

        let thread_id = handle.thread().id();

        Ok(Worker {
            inner: Arc::new(Inner {
                control,
                name,
                thread: Mutex::new(Some(handle)),
                thread_id,
                detached: AtomicBool::new(false),
            }),
        })
    }

    /// Schedules a task onto the worker's inbox.
    ///
    /// The return value is `false` if the worker is halted.
    pub fn schedule(&self, task: T) -> bool {
        self.send(&task)
    }

    pub(crate) fn send(&self, task: &T) -> bool {
        self.inner.control.inbox.send(task)
    }

    /// Halts the worker, blocking until its thread finished running.
    ///
    /// Calling this method multiple times is fine.
    pub fn halt(&self) {
        self.inner.halt();
    }

    /// Tells the worker to stop, without waiting for it to finish its current
    /// task.
    pub(crate) fn close(&self) {
        self.inner.close();
    }

    /// Releases this handle without halting the worker.
    ///
    /// The thread keeps running until its inbox is closed, which can only be
    /// done by the tasks running on the worker.
    pub fn detach(self) {
        self.inner.detached.store(true, Ordering::Release);

        // Dropping the handle detaches the thread.
        drop(self.inner.thread.lock().unwrap().take());
    }

    pub fn state(&self) -> WorkerState {
        self.inner.control.state.load()
    }

    pub fn is_alive(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Returns the number of tasks waiting in the inbox.
    pub fn pending(&self) -> usize {
        self.inner.control.inbox.len()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<T: Task> Clone for Worker<T> {
    fn clone(&self) -> Self {
        Worker { inner: self.inner.clone() }
    }
}

/// The handler of workers that just run their tasks.
pub(crate) fn apply<T: Task>(task: T) {
    task.apply();
}
