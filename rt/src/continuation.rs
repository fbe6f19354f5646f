//! Passing values between tasks without blocking.
//!
//! A continuation pairs senders of values with receivers of values. Unlike a
//! channel, neither side ever waits: if there's no one to pair with, the
//! sender or receiver is stored in a queue and the call returns. Instead of
//! a thread waiting for a value, a receiver provides a task (the
//! "continuation") to run once a value is available.
//!
//! When a sender and receiver are paired, both their continuations are
//! scheduled using `dispatch::schedule()`, as new tasks:
//!
//! - the receiver's continuation, applied to a copy of the value
//! - the sender's continuation, applied to the value itself
//!
//! Continuations are never called directly by `send()` or `recv()`, so long
//! chains of senders and receivers don't grow the stack.
//!
//! Senders and receivers are paired in the order they arrive.
use crate::dispatch::schedule;
use crate::task::Task;
use std::collections::VecDeque;
use std::mem::take;
use std::sync::{Arc, Mutex, MutexGuard};

/// A function used for copying values handed to receivers.
pub type Copier<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

struct State<T> {
    /// The values waiting for a receiver, and the continuations of their
    /// senders.
    senders: VecDeque<(T, T)>,

    /// The continuations waiting for a value.
    receivers: VecDeque<T>,

    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    copier: Copier<T>,
}

/// A rendezvous point for tasks sending and receiving values.
pub struct Continuation<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Task> Continuation<T> {
    /// Returns a continuation that gives receivers a deep copy of the values
    /// sent.
    pub fn new() -> Self {
        Self::with_copier(T::deep_copy)
    }

    /// Returns a continuation that uses `copier` to copy the values given to
    /// receivers.
    pub fn with_copier<F>(copier: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        let state = State {
            senders: VecDeque::new(),
            receivers: VecDeque::new(),
            closed: false,
        };

        Continuation {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                copier: Arc::new(copier),
            }),
        }
    }

    /// Sends a value to the oldest waiting receiver, or stores it until a
    /// receiver arrives.
    ///
    /// Once the value is received, `continuation` is applied to it.
    ///
    /// The return value is `false` if the continuation is closed.
    pub fn send(&self, value: T, continuation: T) -> bool {
        let receiver = {
            let mut state = self.lock();

            if state.closed {
                return false;
            }

            match state.receivers.pop_front() {
                Some(receiver) => receiver,
                None => {
                    state.senders.push_back((value, continuation));
                    return true;
                }
            }
        };

        self.resume(value, continuation, receiver);
        true
    }

    /// Sends a value without caring about when it's received.
    pub fn send_value(&self, value: T) -> bool {
        self.send(value, T::noop())
    }

    /// Applies `continuation` to the oldest value sent, or to the first value
    /// sent in the future.
    ///
    /// The return value is `false` if the continuation is closed.
    pub fn recv(&self, continuation: T) -> bool {
        let (value, sender) = {
            let mut state = self.lock();

            if state.closed {
                return false;
            }

            match state.senders.pop_front() {
                Some(pair) => pair,
                None => {
                    state.receivers.push_back(continuation);
                    return true;
                }
            }
        };

        self.resume(value, sender, continuation);
        true
    }

    /// Closes the continuation.
    ///
    /// Senders and receivers still waiting are discarded, and future calls to
    /// `send()` and `recv()` fail.
    pub fn close(&self) {
        let discarded = {
            let mut state = self.lock();

            state.closed = true;
            (take(&mut state.senders), take(&mut state.receivers))
        };

        drop(discarded);
    }

    /// Removes a waiting sender or receiver, based on its continuation.
    ///
    /// Senders are checked first. Only the oldest match is removed. The
    /// return value is `true` if anything is removed.
    pub fn withdraw(&self, continuation: &T) -> bool {
        let removed = {
            let mut state = self.lock();
            let sender = state
                .senders
                .iter()
                .position(|(_, cont)| cont.equals(continuation));

            if let Some(index) = sender {
                state.senders.remove(index).map(|(_, cont)| cont)
            } else {
                let receiver = state
                    .receivers
                    .iter()
                    .position(|cont| cont.equals(continuation));

                receiver.and_then(|index| state.receivers.remove(index))
            }
        };

        removed.is_some()
    }

    pub fn pending_senders(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn pending_receivers(&self) -> usize {
        self.lock().receivers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn resume(&self, value: T, sender: T, receiver: T) {
        let copy = (self.shared.copier)(&value);

        if !schedule(receiver.bind(copy)) {
            log::trace!("Failed to schedule the continuation of a receiver");
        }

        if !schedule(sender.bind(value)) {
            log::trace!("Failed to schedule the continuation of a sender");
        }
    }

    fn lock(&self) -> MutexGuard<State<T>> {
        self.shared.state.lock().unwrap()
    }
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Continuation { shared: self.shared.clone() }
    }
}
