//! Live identity lookups used to fix owner-name casing.
//!
//! # Responsibility
//! - Define the contract for an authoritative "who is online" source.
//! - Provide an in-process roster the embedding host keeps current.
//!
//! # Invariants
//! - Lookups are case-insensitive; the returned name is the canonical spelling.
//! - A lookup never blocks on I/O.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Authoritative source of correctly cased owner names.
pub trait IdentitySource: Send + Sync {
    /// Returns the canonical spelling of `candidate` if the source knows it.
    fn resolve_canonical_name(&self, candidate: &str) -> Option<String>;
}

/// Identity source that never knows anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentitySource;

impl IdentitySource for NoIdentitySource {
    fn resolve_canonical_name(&self, _candidate: &str) -> Option<String> {
        None
    }
}

/// Roster of currently connected owners, maintained by the host.
#[derive(Debug, Default)]
pub struct OnlineRoster {
    // lower-cased name -> canonical name
    names: RwLock<HashMap<String, String>>,
}

impl OnlineRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an owner as online under their canonical spelling.
    pub fn join(&self, canonical_name: impl Into<String>) {
        let canonical_name = canonical_name.into();
        self.names
            .write()
            .insert(canonical_name.to_lowercase(), canonical_name);
    }

    /// Removes an owner; returns whether they were online.
    pub fn leave(&self, name: &str) -> bool {
        self.names.write().remove(&name.to_lowercase()).is_some()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl IdentitySource for OnlineRoster {
    fn resolve_canonical_name(&self, candidate: &str) -> Option<String> {
        self.names.read().get(&candidate.to_lowercase()).cloned()
    }
}
