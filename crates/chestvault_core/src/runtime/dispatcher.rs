//! Continuation dispatch onto the affinity thread.

use super::scheduler::HostScheduler;
use std::sync::Arc;

/// How a continuation was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Ran synchronously; the caller was already on the affinity thread.
    Inline,
    /// Queued on the host scheduler; runs later on the affinity thread.
    Queued,
}

/// Runs continuations on the host's affinity thread.
#[derive(Clone)]
pub struct AffinityDispatcher {
    scheduler: Arc<dyn HostScheduler>,
}

impl AffinityDispatcher {
    pub fn new(scheduler: Arc<dyn HostScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn is_affinity_thread(&self) -> bool {
        self.scheduler.is_affinity_thread()
    }

    /// Invokes `continuation(value)` on the affinity thread.
    ///
    /// On the affinity thread the call completes before this returns.
    /// Elsewhere one task is queued and this returns immediately.
    pub fn dispatch<T, F>(&self, continuation: F, value: T) -> Dispatched
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        if self.scheduler.is_affinity_thread() {
            continuation(value);
            return Dispatched::Inline;
        }
        self.scheduler
            .run_on_affinity_thread(Box::new(move || continuation(value)));
        Dispatched::Queued
    }
}
