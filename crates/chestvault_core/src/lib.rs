//! Per-owner item container storage core.
//!
//! Containers are keyed by owner name and group, stored as binary tag
//! records, and loaded off the host's affinity thread with concurrent
//! requests merged into one fetch.

pub mod codec;
pub mod config;
pub mod db;
pub mod identity;
pub mod import;
pub mod loader;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod store;
pub mod tag;

pub use codec::{encode_container, infer_rows, ContainerDecoder};
pub use config::{ConfigError, LoaderConfig};
pub use identity::{IdentitySource, NoIdentitySource, OnlineRoster};
pub use import::{AdapterError, ImportAdapter, ImportChain, ImportChainError};
pub use loader::{
    BuildError, ContainerCache, ContainerKey, Continuation, LoadCoordinator, LoadError,
    LoadOutcome, LoadStatus,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::container::{
    Container, ItemId, ItemStack, SharedContainer, MAX_ROWS, SLOTS_PER_ROW,
};
pub use model::group::GroupId;
pub use runtime::{AffinityDispatcher, Dispatched, HostScheduler, ThreadedScheduler};
pub use store::{BackingStore, FileBackingStore, SqliteBackingStore, StoreError};
pub use tag::{MalformedFormatError, NamedTag};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
