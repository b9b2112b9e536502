//! Priority-ordered registry of import adapters.

use super::ImportAdapter;
use crate::model::container::Container;
use crate::model::group::GroupId;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Adapter registration/ordering errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportChainError {
    InvalidAdapterId(String),
    DuplicateAdapterId(String),
    AdapterNotFound(String),
}

impl Display for ImportChainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAdapterId(value) => write!(f, "import adapter id is invalid: {value}"),
            Self::DuplicateAdapterId(value) => {
                write!(f, "import adapter id already registered: {value}")
            }
            Self::AdapterNotFound(value) => write!(f, "import adapter not found: {value}"),
        }
    }
}

impl Error for ImportChainError {}

/// Container produced by one adapter.
#[derive(Debug)]
pub struct ImportedContainer {
    pub adapter_id: String,
    pub container: Container,
}

/// Import adapters in the order they are consulted.
#[derive(Default, Clone)]
pub struct ImportChain {
    adapters: Vec<Arc<dyn ImportAdapter>>,
}

impl ImportChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one adapter at the lowest priority.
    pub fn register(&mut self, adapter: Arc<dyn ImportAdapter>) -> Result<(), ImportChainError> {
        let adapter_id = adapter.adapter_id().trim().to_string();
        if !is_valid_adapter_id(&adapter_id) {
            return Err(ImportChainError::InvalidAdapterId(adapter_id));
        }
        if self.position(&adapter_id).is_some() {
            return Err(ImportChainError::DuplicateAdapterId(adapter_id));
        }

        self.adapters.push(adapter);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapter ids in consultation order.
    pub fn adapter_ids(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|adapter| adapter.adapter_id().trim().to_string())
            .collect()
    }

    /// Moves the listed adapters to the front, in the listed order.
    ///
    /// Adapters not listed keep their relative registration order behind them.
    /// Fails without reordering when any listed id is unknown.
    pub fn apply_priority<S: AsRef<str>>(&mut self, order: &[S]) -> Result<(), ImportChainError> {
        let mut front = Vec::with_capacity(order.len());
        for id in order {
            let id = id.as_ref().trim();
            let index = self
                .position(id)
                .ok_or_else(|| ImportChainError::AdapterNotFound(id.to_string()))?;
            if !front.contains(&index) {
                front.push(index);
            }
        }

        let mut reordered: Vec<Arc<dyn ImportAdapter>> =
            front.iter().map(|index| self.adapters[*index].clone()).collect();
        reordered.extend(
            self.adapters
                .iter()
                .enumerate()
                .filter(|(index, _)| !front.contains(index))
                .map(|(_, adapter)| adapter.clone()),
        );
        self.adapters = reordered;
        Ok(())
    }

    /// Tries each available adapter in order; the first container wins.
    ///
    /// Adapter errors are logged and skipped.
    pub fn import_first(&self, owner_name: &str, group: &GroupId) -> Option<ImportedContainer> {
        for adapter in &self.adapters {
            let adapter_id = adapter.adapter_id().trim();
            if !adapter.available() {
                continue;
            }
            match adapter.import_container(owner_name, group) {
                Ok(Some(container)) => {
                    info!(
                        "event=container_import module=import status=ok adapter={} group={}",
                        adapter_id, group
                    );
                    return Some(ImportedContainer {
                        adapter_id: adapter_id.to_string(),
                        container,
                    });
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "event=container_import module=import status=error adapter={} group={} error={}",
                        adapter_id, group, err
                    );
                }
            }
        }
        None
    }

    fn position(&self, adapter_id: &str) -> Option<usize> {
        self.adapters
            .iter()
            .position(|adapter| adapter.adapter_id().trim() == adapter_id)
    }
}

fn is_valid_adapter_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{ImportChain, ImportChainError};
    use crate::import::{AdapterError, ImportAdapter};
    use crate::model::container::{Container, ItemId, ItemStack};
    use crate::model::group::GroupId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behavior {
        Unavailable,
        Empty,
        Fails,
        Returns(usize),
    }

    struct MockAdapter {
        adapter_id: String,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        fn new(adapter_id: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                adapter_id: adapter_id.to_string(),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ImportAdapter for MockAdapter {
        fn adapter_id(&self) -> &str {
            &self.adapter_id
        }

        fn available(&self) -> bool {
            !matches!(self.behavior, Behavior::Unavailable)
        }

        fn import_container(
            &self,
            owner_name: &str,
            _group: &GroupId,
        ) -> Result<Option<Container>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Unavailable | Behavior::Empty => Ok(None),
                Behavior::Fails => Err(AdapterError::new(&self.adapter_id, "corrupt record")),
                Behavior::Returns(slot) => {
                    let mut container = Container::new(owner_name, false, 3);
                    container.insert_item(slot, ItemStack::new(ItemId::Numeric(1), 1));
                    Ok(Some(container))
                }
            }
        }
    }

    #[test]
    fn rejects_invalid_or_duplicate_adapter_id() {
        let mut chain = ImportChain::new();
        let invalid = chain.register(MockAdapter::new("Multi Inv", Behavior::Empty));
        assert!(matches!(invalid, Err(ImportChainError::InvalidAdapterId(_))));

        chain
            .register(MockAdapter::new("multiinv", Behavior::Empty))
            .expect("first adapter should register");
        let duplicate = chain.register(MockAdapter::new("multiinv", Behavior::Empty));
        assert!(matches!(
            duplicate,
            Err(ImportChainError::DuplicateAdapterId(_))
        ));
    }

    #[test]
    fn first_container_wins_after_skipping_empty_failing_and_unavailable() {
        let unavailable = MockAdapter::new("offline", Behavior::Unavailable);
        let empty = MockAdapter::new("empty", Behavior::Empty);
        let failing = MockAdapter::new("broken", Behavior::Fails);
        let winner = MockAdapter::new("vanilla", Behavior::Returns(4));
        let never = MockAdapter::new("never", Behavior::Returns(5));

        let mut chain = ImportChain::new();
        for adapter in [&unavailable, &empty, &failing, &winner, &never] {
            chain.register(adapter.clone()).expect("register");
        }

        let imported = chain
            .import_first("Notch", &GroupId::new("default"))
            .expect("one adapter has data");
        assert_eq!(imported.adapter_id, "vanilla");
        assert!(imported.container.item(4).is_some());

        assert_eq!(unavailable.calls.load(Ordering::SeqCst), 0);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn apply_priority_moves_listed_adapters_first() {
        let mut chain = ImportChain::new();
        for id in ["a", "b", "c", "d"] {
            chain
                .register(MockAdapter::new(id, Behavior::Empty))
                .expect("register");
        }

        chain.apply_priority(&["c", "a"]).expect("known ids");
        assert_eq!(chain.adapter_ids(), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn apply_priority_rejects_unknown_id_without_reordering() {
        let mut chain = ImportChain::new();
        chain
            .register(MockAdapter::new("a", Behavior::Empty))
            .expect("register");
        chain
            .register(MockAdapter::new("b", Behavior::Empty))
            .expect("register");

        let err = chain
            .apply_priority(&["b", "missing"])
            .expect_err("unknown id must fail");
        assert_eq!(err, ImportChainError::AdapterNotFound("missing".to_string()));
        assert_eq!(chain.adapter_ids(), vec!["a", "b"]);
    }

    #[test]
    fn empty_chain_imports_nothing() {
        let chain = ImportChain::new();
        assert!(chain.import_first("Notch", &GroupId::new("default")).is_none());
    }
}
