use atomic_wait::{wait, wake_all};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub(crate) struct Token(u32);

/// A lock-free condition variable using the platform's lightweight mutex
/// implementation (e.g. futex on Linux).
pub(crate) struct Notifier {
    value: AtomicU32,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self { value: AtomicU32::new(0) }
    }

    pub(crate) fn notify_all(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
        wake_all(&self.value);
    }

    pub(crate) fn prepare_wait(&self) -> Token {
        Token(self.value.load(Ordering::Acquire))
    }

    pub(crate) fn wait(&self, token: Token) {
        wait(&self.value, token.0);
    }
}

/// A flag that is raised once, and that threads can wait for.
///
/// Workers use these to tell their owners that they're ready to receive work,
/// and that they finished running.
pub(crate) struct Signal {
    raised: AtomicBool,
    notifier: Notifier,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self { raised: AtomicBool::new(false), notifier: Notifier::new() }
    }

    pub(crate) fn raise(&self) {
        self.raised.store(true, Ordering::Release);
        self.notifier.notify_all();
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Blocks the calling thread until the signal is raised.
    pub(crate) fn wait(&self) {
        loop {
            // The token must be obtained before checking the flag, otherwise a
            // raise() in between the check and the wait is lost.
            let token = self.notifier.prepare_wait();

            if self.is_raised() {
                return;
            }

            self.notifier.wait(token);
        }
    }
}
