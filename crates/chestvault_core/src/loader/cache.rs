//! Shared cache of loaded containers.

use crate::model::container::SharedContainer;
use crate::model::group::GroupId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Cache key: owner name compared case-insensitively, group exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    owner: String,
    group: GroupId,
}

impl ContainerKey {
    pub fn new(owner_name: &str, group: &GroupId) -> Self {
        Self {
            owner: owner_name.to_ascii_lowercase(),
            group: group.clone(),
        }
    }

    /// Lowercased owner name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }
}

/// Loaded containers, readable from any thread.
///
/// The coordinator writes after every successful load; the host may evict
/// entries at any time (for example when an owner goes offline).
#[derive(Debug, Default)]
pub struct ContainerCache {
    entries: RwLock<HashMap<ContainerKey, SharedContainer>>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ContainerKey) -> Option<SharedContainer> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &ContainerKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Stores `container`, returning the entry it replaced.
    pub fn put(&self, key: ContainerKey, container: SharedContainer) -> Option<SharedContainer> {
        self.entries.write().insert(key, container)
    }

    pub fn remove(&self, key: &ContainerKey) -> Option<SharedContainer> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContainerCache, ContainerKey};
    use crate::model::container::Container;
    use crate::model::group::GroupId;
    use std::sync::Arc;

    #[test]
    fn key_ignores_owner_case_but_not_group() {
        let group = GroupId::new("default");
        assert_eq!(
            ContainerKey::new("Alex", &group),
            ContainerKey::new("aLEX", &group)
        );
        assert_ne!(
            ContainerKey::new("Alex", &group),
            ContainerKey::new("Alex", &GroupId::new("Default"))
        );
    }

    #[test]
    fn put_get_remove_round_trip() {
        let cache = ContainerCache::new();
        let group = GroupId::new("default");
        let container = Arc::new(Container::new("Alex", true, 2));

        assert!(cache
            .put(ContainerKey::new("Alex", &group), Arc::clone(&container))
            .is_none());
        let hit = cache
            .get(&ContainerKey::new("alex", &group))
            .expect("cached");
        assert!(Arc::ptr_eq(&hit, &container));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove(&ContainerKey::new("ALEX", &group)).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn put_returns_replaced_entry_and_clear_empties() {
        let cache = ContainerCache::new();
        let key = ContainerKey::new("Alex", &GroupId::new("default"));
        let first = Arc::new(Container::new("Alex", true, 1));
        let second = Arc::new(Container::new("Alex", true, 2));

        cache.put(key.clone(), Arc::clone(&first));
        let replaced = cache.put(key.clone(), second).expect("replaced");
        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(cache.contains(&key));

        cache.clear();
        assert!(!cache.contains(&key));
    }
}
