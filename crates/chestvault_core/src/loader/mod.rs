//! Container loading pipeline.
//!
//! # Responsibility
//! - Serve cached containers without touching storage.
//! - Merge concurrent requests for one key into a single background fetch.
//! - Fall back to import adapters, then to a fresh empty container.
//! - Deliver every outcome on the host's affinity thread.
//!
//! # Invariants
//! - Keys compare owner names case-insensitively and groups exactly.
//! - Failed loads are delivered to every waiter and never cached.

mod cache;
mod coordinator;
mod request;

pub use cache::{ContainerCache, ContainerKey};
pub use coordinator::{BuildError, LoadCoordinator, LoadCoordinatorBuilder, LoadStatus};
pub use request::{Continuation, LoadError, LoadOutcome, LoadRequest};
