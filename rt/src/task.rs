//! The values executed by workers.
//!
//! The runtime never looks inside a task. It only moves tasks between threads,
//! copies them when they cross a thread boundary, and applies them once they
//! reach a worker. Anything that can provide the operations of the `Task` trait
//! can be scheduled, whether that's a closure, an interpreter expression or a
//! message understood by some other system.

/// A unit of work that can be scheduled onto a worker.
pub trait Task: Sized + Send + 'static {
    /// Runs the task, returning whatever it produced.
    ///
    /// Applying a task may schedule new tasks, send values to a continuation,
    /// or use channels. The result is discarded by workers.
    fn apply(self) -> Self;

    /// Returns a structural copy of `self`.
    ///
    /// The copy must not share mutable state with the original, as the two
    /// values end up being used by different threads.
    fn deep_copy(&self) -> Self;

    fn equals(&self, other: &Self) -> bool;

    /// Returns a task that applies `self` to `argument` when applied.
    ///
    /// This is used to resume continuations with the values they waited for.
    fn bind(self, argument: Self) -> Self;

    /// Returns a task that does nothing when applied.
    fn noop() -> Self;
}
