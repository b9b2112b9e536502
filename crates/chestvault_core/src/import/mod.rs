//! Foreign-format import adapters.
//!
//! # Responsibility
//! - Define the adapter contract for reading another system's stored
//!   containers.
//! - Order adapters by configured priority and pick the first result.
//!
//! # Invariants
//! - Adapters are consulted only when the primary store has no record.
//! - An adapter failure never aborts the load; the next adapter is tried.

use crate::model::container::Container;
use crate::model::group::GroupId;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod chain;

pub use chain::{ImportChain, ImportChainError, ImportedContainer};

/// Source of containers stored by another system.
pub trait ImportAdapter: Send + Sync {
    /// Stable id (`[a-z0-9_-]+`) used for priority configuration and logs.
    fn adapter_id(&self) -> &str;

    /// Whether the foreign system is present at all.
    fn available(&self) -> bool;

    /// Translates the foreign record for `(owner_name, group)`.
    ///
    /// Returns `Ok(None)` when the foreign system has no data for the key.
    fn import_container(
        &self,
        owner_name: &str,
        group: &GroupId,
    ) -> Result<Option<Container>, AdapterError>;
}

/// A foreign record exists but could not be translated.
#[derive(Debug)]
pub struct AdapterError {
    pub adapter_id: String,
    pub message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl AdapterError {
    pub fn new(adapter_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "import via `{}` failed: {}", self.adapter_id, self.message)
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}
