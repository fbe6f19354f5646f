//! Tracking of the worker running on the current thread.
//!
//! Worker threads register themselves when they start, and remove their
//! registration when they stop. The registration is used to figure out where
//! to schedule new work: tasks running on a pool's worker schedule new work
//! onto that pool, tasks running on a bare worker schedule onto that worker.
//!
//! Registrations form a stack, and the previous registration is restored when
//! a scope ends.
use crate::channel::Channel;
use crate::pool::WeakPool;
use crate::task::Task;
use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// A single registration of a worker.
struct Frame {
    /// The index of the worker in its pool, if it belongs to one.
    index: Option<usize>,

    /// The `Ambient` of the worker.
    ///
    /// Workers are generic over the type of task they run, so the concrete
    /// type is only known to code asking for the same task type.
    ambient: Box<dyn Any>,
}

/// The worker (and pool) that runs on a thread.
pub(crate) struct Ambient<T: Task> {
    /// The inbox of the worker.
    pub(crate) inbox: Channel<T>,

    /// The pool the worker belongs to, if any.
    pub(crate) pool: Option<WeakPool<T>>,
}

impl<T: Task> Clone for Ambient<T> {
    fn clone(&self) -> Self {
        Ambient { inbox: self.inbox.clone(), pool: self.pool.clone() }
    }
}

/// A guard that removes a registration when dropped.
///
/// Scopes must be dropped on the thread that created them, which is enforced
/// by the raw pointer making this type `!Send`.
pub(crate) struct Scope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        FRAMES.with(|frames| frames.borrow_mut().pop());
    }
}

/// Registers a worker for the current thread, until the returned scope is
/// dropped.
pub(crate) fn enter<T: Task>(
    ambient: Ambient<T>,
    index: Option<usize>,
) -> Scope {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame { index, ambient: Box::new(ambient) })
    });

    Scope { _not_send: PhantomData }
}

/// Returns the worker registered for the current thread, if it runs tasks of
/// type `T`.
pub(crate) fn current<T: Task>() -> Option<Ambient<T>> {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .and_then(|frame| frame.ambient.downcast_ref::<Ambient<T>>())
            .cloned()
    })
}

/// Returns `true` if the current thread is a worker thread.
pub fn in_worker() -> bool {
    FRAMES.with(|frames| !frames.borrow().is_empty())
}

/// Returns `true` if the current thread is a worker of a pool running tasks of
/// type `T`.
pub fn in_pool<T: Task>() -> bool {
    current::<T>().map_or(false, |ambient| ambient.pool.is_some())
}

/// Returns the index of the current worker within its pool.
///
/// Bare workers and threads that aren't workers don't have an index.
pub fn worker_index() -> Option<usize> {
    FRAMES.with(|frames| frames.borrow().last().and_then(|frame| frame.index))
}
