//! Closeable, synchronised queues for handing tasks between threads.
//!
//! A channel can be bounded or unbounded. Sending to a full bounded channel
//! blocks the sender until space is available, while receiving from an empty
//! channel blocks the receiver until a value is sent.
//!
//! Values are never shared between the sender and receiver: sending a value
//! stores a deep copy, so the receiver always owns an independent value.
//!
//! ## Closing
//!
//! Closing a channel wakes up all blocked senders and receivers, and discards
//! any values still buffered. Sending to or receiving from a closed channel
//! fails immediately. A closed channel can't be reopened.
use crate::task::Task;
use std::collections::VecDeque;
use std::mem::take;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct State<T> {
    values: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,

    /// The maximum number of buffered values, or 0 for no limit.
    capacity: usize,

    /// Used for waking up receivers when a value is sent.
    not_empty: Condvar,

    /// Used for waking up senders when a value is received.
    not_full: Condvar,
}

/// A multiple producer, multiple consumer first-in-first-out channel.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Task> Channel<T> {
    /// Returns a new channel that can buffer `capacity` values.
    ///
    /// A capacity of zero results in an unbounded channel.
    pub fn new(capacity: usize) -> Self {
        let values = if capacity > 0 {
            VecDeque::with_capacity(capacity)
        } else {
            VecDeque::new()
        };

        Channel {
            shared: Arc::new(Shared {
                state: Mutex::new(State { values, closed: false }),
                capacity,
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Sends a copy of `value`, blocking while the channel is full.
    ///
    /// The return value is `false` if the channel is (or got) closed.
    pub fn send(&self, value: &T) -> bool {
        let value = value.deep_copy();
        let mut state = self.lock();

        while !state.closed && self.is_full(&state) {
            state = self.shared.not_full.wait(state).unwrap();
        }

        if state.closed {
            return false;
        }

        state.values.push_back(value);
        self.shared.not_empty.notify_one();
        true
    }

    /// Sends a copy of `value` without blocking.
    ///
    /// The return value is `false` if the channel is full or closed.
    pub fn try_send(&self, value: &T) -> bool {
        let mut state = self.lock();

        if state.closed || self.is_full(&state) {
            return false;
        }

        state.values.push_back(value.deep_copy());
        self.shared.not_empty.notify_one();
        true
    }

    /// Receives a value, blocking while the channel is empty.
    ///
    /// A `None` is returned once the channel is closed.
    pub fn recv(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return None;
            }

            if let Some(value) = state.values.pop_front() {
                self.shared.not_full.notify_one();
                return Some(value);
            }

            state = self.shared.not_empty.wait(state).unwrap();
        }
    }

    /// Receives a value without blocking.
    pub fn try_recv(&self) -> Option<T> {
        let mut state = self.lock();

        if state.closed {
            return None;
        }

        let value = state.values.pop_front();

        if value.is_some() {
            self.shared.not_full.notify_one();
        }

        value
    }

    /// Closes the channel, waking up all blocked threads.
    ///
    /// Closing an already closed channel still wakes up any waiting threads.
    pub fn close(&self) {
        let discarded = {
            let mut state = self.lock();

            state.closed = true;
            take(&mut state.values)
        };

        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();

        // Dropping a task may run arbitrary code (including code that uses
        // this channel), so this must happen without holding the lock.
        drop(discarded);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    fn is_full(&self, state: &State<T>) -> bool {
        self.shared.capacity > 0 && state.values.len() >= self.shared.capacity
    }

    fn lock(&self) -> MutexGuard<State<T>> {
        self.shared.state.lock().unwrap()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel { shared: self.shared.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread::{scope, sleep};
    use std::time::Duration;

    #[test]
    fn test_new() {
        let chan: Channel<Job> = Channel::new(4);

        assert_eq!(chan.capacity(), 4);
        assert_eq!(chan.len(), 0);
        assert!(chan.is_empty());
        assert!(!chan.is_closed());
    }

    #[test]
    fn test_send_recv_order() {
        let chan = Channel::unbounded();

        assert!(chan.send(&Job::Int(1)));
        assert!(chan.send(&Job::Int(2)));
        assert!(chan.send(&Job::Int(3)));
        assert_eq!(chan.len(), 3);

        assert_eq!(chan.recv().and_then(|v| v.as_int()), Some(1));
        assert_eq!(chan.recv().and_then(|v| v.as_int()), Some(2));
        assert_eq!(chan.recv().and_then(|v| v.as_int()), Some(3));
        assert!(chan.is_empty());
    }

    #[test]
    fn test_send_copies_value() {
        let chan = Channel::unbounded();
        let value = Job::list(vec![Job::text("foo")]);

        chan.send(&value);

        let received = chan.recv().unwrap();

        assert!(received.equals(&value));
        assert!(!received.same(&value));
    }

    #[test]
    fn test_unbounded_send_never_blocks() {
        let chan = Channel::unbounded();

        for i in 0..10_000 {
            assert!(chan.send(&Job::Int(i)));
        }

        assert_eq!(chan.len(), 10_000);
    }

    #[test]
    fn test_bounded_send_blocks_when_full() {
        let chan = Channel::new(2);
        let sent = AtomicBool::new(false);

        assert!(chan.send(&Job::Int(1)));
        assert!(chan.send(&Job::Int(2)));
        assert!(!chan.try_send(&Job::Int(3)));

        scope(|s| {
            let sender = s.spawn(|| {
                let res = chan.send(&Job::Int(3));

                sent.store(true, Ordering::Release);
                res
            });

            // There's no way to observe a thread being blocked, so we give the
            // sender some time to (incorrectly) finish.
            sleep(Duration::from_millis(50));
            assert!(!sent.load(Ordering::Acquire));

            assert_eq!(chan.recv().and_then(|v| v.as_int()), Some(1));
            assert!(sender.join().unwrap());
        });

        assert!(sent.load(Ordering::Acquire));
        assert_eq!(chan.len(), 2);
    }

    #[test]
    fn test_recv_blocks_until_send() {
        let chan = Channel::unbounded();
        let barrier = Barrier::new(2);

        let value = scope(|s| {
            let receiver = s.spawn(|| {
                barrier.wait();
                chan.recv()
            });

            barrier.wait();
            chan.send(&Job::Int(42));
            receiver.join().unwrap()
        });

        assert_eq!(value.and_then(|v| v.as_int()), Some(42));
    }

    #[test]
    fn test_try_recv() {
        let chan = Channel::unbounded();

        assert!(chan.try_recv().is_none());

        chan.send(&Job::Int(1));

        assert_eq!(chan.try_recv().and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_close() {
        let chan = Channel::unbounded();

        chan.send(&Job::Int(1));
        chan.close();

        assert!(chan.is_closed());
        assert_eq!(chan.len(), 0);
        assert!(!chan.send(&Job::Int(2)));
        assert!(!chan.try_send(&Job::Int(2)));
        assert!(chan.recv().is_none());
        assert!(chan.try_recv().is_none());
    }

    #[test]
    fn test_close_twice() {
        let chan: Channel<Job> = Channel::new(1);

        chan.close();
        chan.close();

        assert!(chan.is_closed());
        assert!(!chan.send(&Job::Nil));
        assert!(chan.recv().is_none());
    }

    #[test]
    fn test_close_wakes_up_receivers() {
        let chan: Channel<Job> = Channel::unbounded();
        let barrier = Barrier::new(3);

        scope(|s| {
            let receivers: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        chan.recv()
                    })
                })
                .collect();

            barrier.wait();
            sleep(Duration::from_millis(10));
            chan.close();

            for receiver in receivers {
                assert!(receiver.join().unwrap().is_none());
            }
        });
    }

    #[test]
    fn test_close_wakes_up_senders() {
        let chan = Channel::new(1);
        let barrier = Barrier::new(2);

        chan.send(&Job::Int(1));

        let sent = scope(|s| {
            let sender = s.spawn(|| {
                barrier.wait();
                chan.send(&Job::Int(2))
            });

            barrier.wait();
            sleep(Duration::from_millis(10));
            chan.close();
            sender.join().unwrap()
        });

        assert!(!sent);
    }

    #[test]
    fn test_clone_shares_state() {
        let chan = Channel::unbounded();
        let copy = chan.clone();

        copy.send(&Job::Int(1));
        chan.close();

        assert!(copy.is_closed());
        assert_eq!(copy.len(), 0);
    }
}
