//! Deduplicating asynchronous container loads.

use super::cache::{ContainerCache, ContainerKey};
use super::request::{Continuation, LoadError, LoadOutcome, LoadRequest};
use crate::codec::{infer_rows, ContainerDecoder};
use crate::config::{ConfigError, LoaderConfig};
use crate::identity::{IdentitySource, NoIdentitySource};
use crate::import::{ImportChain, ImportChainError};
use crate::model::container::{Container, SharedContainer};
use crate::model::group::GroupId;
use crate::runtime::panic_message;
use crate::runtime::{AffinityDispatcher, Dispatched, HostScheduler};
use crate::store::BackingStore;
use indexmap::IndexSet;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// What `LoadCoordinator::load` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The container was cached; the continuation was dispatched directly.
    Cached(Dispatched),
    /// No load was in flight; a background fetch was started.
    Started,
    /// A load was in flight; the request now waits on it.
    Joined,
    /// An equal request was already waiting; nothing changed.
    Duplicate,
}

/// Why a `LoadCoordinator` could not be built.
#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    Import(ImportChainError),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "loader config rejected: {err}"),
            Self::Import(err) => write!(f, "import chain rejected: {err}"),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Import(err) => Some(err),
        }
    }
}

impl From<ConfigError> for BuildError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ImportChainError> for BuildError {
    fn from(value: ImportChainError) -> Self {
        Self::Import(value)
    }
}

/// Builder for `LoadCoordinator`.
pub struct LoadCoordinatorBuilder {
    store: Arc<dyn BackingStore>,
    scheduler: Arc<dyn HostScheduler>,
    identity: Arc<dyn IdentitySource>,
    cache: Option<Arc<ContainerCache>>,
    importers: ImportChain,
    config: LoaderConfig,
}

impl LoadCoordinatorBuilder {
    pub fn identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    /// Shares an existing cache instead of creating a private one.
    pub fn cache(mut self, cache: Arc<ContainerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn importers(mut self, importers: ImportChain) -> Self {
        self.importers = importers;
        self
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// # Errors
    /// - `Config` when the config fails `LoaderConfig::validate`.
    /// - `Import` when `import_priority` names an unregistered adapter.
    pub fn build(self) -> Result<LoadCoordinator, BuildError> {
        self.config.validate()?;
        let mut importers = self.importers;
        importers.apply_priority(&self.config.import_priority)?;

        let decoder = ContainerDecoder::new(self.identity)
            .with_public_key_name(self.config.public_key_name.clone())
            .with_items_tag(self.config.items_tag_name.clone());

        Ok(LoadCoordinator {
            inner: Arc::new(Shared {
                store: self.store,
                importers,
                decoder,
                cache: self.cache.unwrap_or_default(),
                dispatcher: AffinityDispatcher::new(Arc::clone(&self.scheduler)),
                scheduler: self.scheduler,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }
}

/// Loads containers off the affinity thread and delivers them back onto it.
///
/// # Invariants
/// - At most one fetch per key is in flight at any time.
/// - Every request merged into a load sees the same outcome; on success the
///   very same `Arc<Container>`.
/// - A successful outcome is cached before the in-flight entry is removed,
///   and both happen under the in-flight lock, so a new request either joins
///   the load or hits the cache.
/// - Continuations always run on the affinity thread, in registration order,
///   with no coordinator lock held.
/// - If the scheduler drops a fetch or publish task without running it, the
///   in-flight entry is cleared and its waiters get `LoadError::Unscheduled`
///   where the scheduler still accepts affinity work.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn BackingStore>,
    importers: ImportChain,
    decoder: ContainerDecoder,
    cache: Arc<ContainerCache>,
    dispatcher: AffinityDispatcher,
    scheduler: Arc<dyn HostScheduler>,
    in_flight: Mutex<HashMap<ContainerKey, IndexSet<LoadRequest>>>,
}

impl LoadCoordinator {
    pub fn builder(
        store: Arc<dyn BackingStore>,
        scheduler: Arc<dyn HostScheduler>,
    ) -> LoadCoordinatorBuilder {
        LoadCoordinatorBuilder {
            store,
            scheduler,
            identity: Arc::new(NoIdentitySource),
            cache: None,
            importers: ImportChain::new(),
            config: LoaderConfig::default(),
        }
    }

    /// Requests the container of `(owner_name, group)`.
    ///
    /// # Contract
    /// - Cached: `continuation` is dispatched immediately (inline when called
    ///   on the affinity thread) and the store is not touched.
    /// - In flight: the request joins the pending load; an equal request
    ///   already waiting is ignored.
    /// - Otherwise: the request is registered and one background fetch is
    ///   started. This call never blocks on the store.
    pub fn load(
        &self,
        owner_name: &str,
        group: &GroupId,
        continuation: Continuation,
    ) -> LoadStatus {
        let (owner_name, _) = self.inner.decoder.resolve_owner(owner_name);
        let key = ContainerKey::new(&owner_name, group);

        let mut in_flight = self.inner.in_flight.lock();
        if let Some(container) = self.inner.cache.get(&key) {
            drop(in_flight);
            debug!(
                "event=container_load module=loader status=cache_hit group={}",
                group
            );
            let dispatched = self
                .inner
                .dispatcher
                .dispatch(move |outcome| deliver(&continuation, outcome), Ok(container));
            return LoadStatus::Cached(dispatched);
        }

        let request = LoadRequest::new(owner_name.clone(), group.clone(), continuation);
        if let Some(pending) = in_flight.get_mut(&key) {
            return if pending.insert(request) {
                debug!(
                    "event=container_load module=loader status=joined group={} waiting={}",
                    group,
                    pending.len()
                );
                LoadStatus::Joined
            } else {
                LoadStatus::Duplicate
            };
        }
        in_flight.insert(key.clone(), IndexSet::from([request]));
        drop(in_flight);

        self.start_fetch(key, owner_name, group.clone());
        LoadStatus::Started
    }

    /// The cached container of `(owner_name, group)`, if any.
    pub fn cached(&self, owner_name: &str, group: &GroupId) -> Option<SharedContainer> {
        self.inner.cache.get(&ContainerKey::new(owner_name, group))
    }

    /// Number of requests waiting on an in-flight load of the key.
    pub fn pending_requests(&self, owner_name: &str, group: &GroupId) -> usize {
        self.inner
            .in_flight
            .lock()
            .get(&ContainerKey::new(owner_name, group))
            .map_or(0, IndexSet::len)
    }

    pub fn cache(&self) -> &Arc<ContainerCache> {
        &self.inner.cache
    }

    pub fn decoder(&self) -> &ContainerDecoder {
        &self.inner.decoder
    }

    fn start_fetch(&self, key: ContainerKey, owner_name: String, group: GroupId) {
        let load_id = Uuid::new_v4();
        info!(
            "event=container_load module=loader status=start load_id={} store={} group={}",
            load_id,
            self.inner.store.kind(),
            group
        );

        let guard = InFlightGuard {
            coordinator: self.clone(),
            key: Some(key),
            load_id,
        };
        let coordinator = self.clone();
        self.inner.scheduler.run_in_background(Box::new(move || {
            let started_at = Instant::now();
            let outcome = coordinator.fetch(&owner_name, &group);
            let duration_ms = started_at.elapsed().as_millis();
            match &outcome {
                Ok(container) => info!(
                    "event=container_load module=loader status=ok load_id={} rows={} items={} fresh={} duration_ms={}",
                    load_id,
                    container.rows(),
                    container.occupied_slots(),
                    container.is_freshly_created(),
                    duration_ms
                ),
                Err(err) => error!(
                    "event=container_load module=loader status=error load_id={} duration_ms={} error={}",
                    load_id, duration_ms, err
                ),
            }

            coordinator
                .inner
                .dispatcher
                .dispatch(move |outcome| guard.publish(outcome), outcome);
        }));
    }

    fn fetch(&self, owner_name: &str, group: &GroupId) -> LoadOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.fetch_container(owner_name, group))) {
            Ok(result) => result.map(Arc::new),
            Err(payload) => Err(LoadError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn fetch_container(&self, owner_name: &str, group: &GroupId) -> Result<Container, LoadError> {
        let decoder = &self.inner.decoder;
        if let Some(bytes) = self.inner.store.fetch(owner_name, group)? {
            let mut container = decoder.decode_bytes(&bytes, owner_name)?;
            container.set_freshly_created(false);
            return Ok(container);
        }

        if !decoder.is_public_key(owner_name) {
            if let Some(imported) = self.inner.importers.import_first(owner_name, group) {
                let mut container = imported.container;
                container.set_freshly_created(false);
                return Ok(container);
            }
        }

        Ok(decoder.empty_container(owner_name, infer_rows(None)))
    }

    /// Publishes `outcome` to every waiter of `key`.
    ///
    /// Runs on the affinity thread, except when an abandoned load is released
    /// from whichever thread dropped it. Continuations always go through the
    /// dispatcher.
    fn publish(&self, key: &ContainerKey, outcome: LoadOutcome) {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Ok(container) = &outcome {
                self.inner.cache.put(key.clone(), Arc::clone(container));
            }
            in_flight.remove(key).unwrap_or_default()
        };

        for request in pending {
            let continuation = request.into_continuation();
            self.inner.dispatcher.dispatch(
                move |outcome| deliver(&continuation, outcome),
                outcome.clone(),
            );
        }
    }
}

/// Owns the right to publish one in-flight key.
///
/// Travels inside the fetch task and then the publish task. Dropping it
/// unpublished (the scheduler discarded a task) publishes
/// `LoadError::Unscheduled` so the key is not stuck in flight.
struct InFlightGuard {
    coordinator: LoadCoordinator,
    key: Option<ContainerKey>,
    load_id: Uuid,
}

impl InFlightGuard {
    fn publish(mut self, outcome: LoadOutcome) {
        if let Some(key) = self.key.take() {
            self.coordinator.publish(&key, outcome);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            warn!(
                "event=container_load module=loader status=abandoned load_id={} group={}",
                self.load_id,
                key.group()
            );
            self.coordinator.publish(&key, Err(LoadError::Unscheduled));
        }
    }
}

/// Runs one continuation; a panic is logged and does not reach other waiters.
fn deliver(continuation: &Continuation, outcome: LoadOutcome) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| continuation.invoke(outcome))) {
        error!(
            "event=continuation_panic module=loader status=error payload={}",
            panic_message(payload.as_ref())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildError, LoadCoordinator, LoadStatus};
    use crate::config::LoaderConfig;
    use crate::loader::{Continuation, LoadError, LoadOutcome};
    use crate::model::group::GroupId;
    use crate::runtime::{Dispatched, HostScheduler, Task};
    use crate::store::{BackingStore, StoreResult};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Runs everything on the calling thread, which counts as the affinity thread.
    #[derive(Default)]
    struct InlineScheduler {
        background_running: AtomicBool,
    }

    impl HostScheduler for InlineScheduler {
        fn is_affinity_thread(&self) -> bool {
            !self.background_running.load(Ordering::SeqCst)
        }

        fn run_on_affinity_thread(&self, task: Task) {
            task();
        }

        fn run_in_background(&self, task: Task) {
            self.background_running.store(true, Ordering::SeqCst);
            task();
            self.background_running.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct EmptyStore {
        fetches: AtomicUsize,
    }

    impl BackingStore for EmptyStore {
        fn fetch(&self, _owner_name: &str, _group: &GroupId) -> StoreResult<Option<Vec<u8>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        fn kind(&self) -> &'static str {
            "empty"
        }
    }

    struct PanickingStore;

    impl BackingStore for PanickingStore {
        fn fetch(&self, _owner_name: &str, _group: &GroupId) -> StoreResult<Option<Vec<u8>>> {
            panic!("store exploded");
        }

        fn kind(&self) -> &'static str {
            "panicking"
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<LoadOutcome>>>, Continuation) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Continuation::new(move |outcome| sink.lock().push(outcome)))
    }

    #[test]
    fn missing_record_yields_fresh_single_row_container_then_cache_hit() {
        let store = Arc::new(EmptyStore::default());
        let coordinator =
            LoadCoordinator::builder(store.clone(), Arc::new(InlineScheduler::default()))
                .build()
                .expect("coordinator");
        let group = GroupId::new("default");
        let (seen, continuation) = recorder();

        assert_eq!(
            coordinator.load("Alex", &group, continuation.clone()),
            LoadStatus::Started
        );
        {
            let seen = seen.lock();
            let container = seen[0].as_ref().expect("container");
            assert_eq!(container.rows(), 1);
            assert!(container.is_empty());
            assert!(container.is_freshly_created());
            assert_eq!(container.owner_name(), "Alex");
        }

        assert_eq!(
            coordinator.load("ALEX", &group, continuation),
            LoadStatus::Cached(Dispatched::Inline)
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(coordinator.pending_requests("alex", &group), 0);
    }

    #[test]
    fn panicking_store_becomes_load_error_and_nothing_is_cached() {
        let coordinator = LoadCoordinator::builder(
            Arc::new(PanickingStore),
            Arc::new(InlineScheduler::default()),
        )
        .build()
        .expect("coordinator");
        let group = GroupId::new("default");
        let (seen, continuation) = recorder();

        coordinator.load("Alex", &group, continuation);

        let seen = seen.lock();
        let err = seen[0].as_ref().expect_err("panic must surface as error");
        assert!(err.to_string().contains("store exploded"));
        assert!(coordinator.cached("Alex", &group).is_none());
    }

    #[test]
    fn panicking_continuation_is_contained() {
        let coordinator = LoadCoordinator::builder(
            Arc::new(EmptyStore::default()),
            Arc::new(InlineScheduler::default()),
        )
        .build()
        .expect("coordinator");
        let group = GroupId::new("default");
        let (seen, continuation) = recorder();

        coordinator.load("Alex", &group, Continuation::new(|_| panic!("bad waiter")));
        coordinator.load("Alex", &group, continuation);

        assert_eq!(seen.lock().len(), 1);
    }

    /// Accepts affinity work inline but discards every background task.
    struct DiscardingScheduler;

    impl HostScheduler for DiscardingScheduler {
        fn is_affinity_thread(&self) -> bool {
            true
        }

        fn run_on_affinity_thread(&self, task: Task) {
            task();
        }

        fn run_in_background(&self, task: Task) {
            drop(task);
        }
    }

    #[test]
    fn discarded_fetch_clears_the_in_flight_entry() {
        let store = Arc::new(EmptyStore::default());
        let coordinator = LoadCoordinator::builder(store.clone(), Arc::new(DiscardingScheduler))
            .build()
            .expect("coordinator");
        let group = GroupId::new("default");
        let (seen, continuation) = recorder();

        assert_eq!(
            coordinator.load("Alex", &group, continuation.clone()),
            LoadStatus::Started
        );
        assert_eq!(coordinator.pending_requests("Alex", &group), 0);
        assert!(matches!(
            seen.lock()[0].as_ref(),
            Err(LoadError::Unscheduled)
        ));

        assert_eq!(
            coordinator.load("Alex", &group, continuation),
            LoadStatus::Started
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        assert!(coordinator.cached("Alex", &group).is_none());
    }

    #[test]
    fn invalid_config_fails_the_build() {
        let config = LoaderConfig {
            public_key_name: String::new(),
            ..LoaderConfig::default()
        };

        let result = LoadCoordinator::builder(
            Arc::new(EmptyStore::default()),
            Arc::new(InlineScheduler::default()),
        )
        .config(config)
        .build();

        assert!(matches!(result, Err(BuildError::Config(_))));
    }
}
