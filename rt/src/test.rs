//! Helper functions for writing unit tests.
use crate::job::Job;
use crate::task::Task;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// The maximum time to wait for work scheduled onto other threads.
///
/// Tests don't run into this unless they're broken, in which case it's nicer
/// to fail than to hang forever.
const TIMEOUT: Duration = Duration::from_secs(10);

/// A list of values produced by tasks running on other threads.
pub(crate) struct Recorder<V> {
    values: Mutex<Vec<V>>,
    cvar: Condvar,
}

impl<V: Clone> Recorder<V> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Recorder {
            values: Mutex::new(Vec::new()),
            cvar: Condvar::new(),
        })
    }

    pub(crate) fn push(&self, value: V) {
        self.values.lock().unwrap().push(value);
        self.cvar.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    /// Waits until at least `amount` values are recorded, then returns all of
    /// them.
    pub(crate) fn wait_for(&self, amount: usize) -> Vec<V> {
        let values = self.values.lock().unwrap();
        let (values, _) = self
            .cvar
            .wait_timeout_while(values, TIMEOUT, |v| v.len() < amount)
            .unwrap();

        assert!(
            values.len() >= amount,
            "expected {} recorded values, found {}",
            amount,
            values.len()
        );

        values.clone()
    }
}

/// Returns a function that records the value it's applied to.
pub(crate) fn recording(recorder: &Arc<Recorder<Job>>) -> Job {
    let recorder = recorder.clone();

    Job::func(move |value| {
        recorder.push(value);
        Job::Nil
    })
}

/// Blocks until the condition is true.
pub(crate) fn wait_until<F: Fn() -> bool>(condition: F) {
    let start = Instant::now();

    while !condition() {
        assert!(start.elapsed() < TIMEOUT, "timed out waiting for a condition");
        sleep(Duration::from_millis(1));
    }
}

/// A task type that isn't a `Job`, for tests that care about the runtime
/// keeping task types apart.
#[derive(Clone, Debug)]
pub(crate) struct Value(pub(crate) i64);

impl Task for Value {
    fn apply(self) -> Self {
        self
    }

    fn deep_copy(&self) -> Self {
        Value(self.0)
    }

    fn equals(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    fn bind(self, _: Self) -> Self {
        self
    }

    fn noop() -> Self {
        Value(0)
    }
}
