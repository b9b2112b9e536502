//! Thread-affinity runtime: host scheduling and continuation dispatch.
//!
//! # Responsibility
//! - Define the host scheduling capability (affinity thread + background work).
//! - Provide a self-contained threaded scheduler for hosts without one.
//! - Dispatch continuations onto the affinity thread.
//!
//! # Invariants
//! - Tasks posted to the affinity thread run one at a time, in FIFO order.
//! - Dispatch from the affinity thread runs inline, never queued.

mod dispatcher;
mod scheduler;

pub use dispatcher::{AffinityDispatcher, Dispatched};
pub use scheduler::{HostScheduler, Task, ThreadedScheduler};
pub(crate) use scheduler::panic_message;
