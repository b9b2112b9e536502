//! Load requests, continuations and outcomes.

use crate::model::container::SharedContainer;
use crate::model::group::GroupId;
use crate::store::StoreError;
use crate::tag::MalformedFormatError;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Result delivered to every continuation of one load.
pub type LoadOutcome = Result<SharedContainer, LoadError>;

/// Why a load produced no container.
///
/// Cloneable so the same failure can be handed to every waiter.
#[derive(Debug, Clone)]
pub enum LoadError {
    Store(Arc<StoreError>),
    Malformed(Arc<MalformedFormatError>),
    /// The fetch or decode step panicked; carries the panic message.
    Panicked(String),
    /// The scheduler dropped a load task before it finished, usually after shutdown.
    Unscheduled,
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "backing store failed: {err}"),
            Self::Malformed(err) => write!(f, "stored container is malformed: {err}"),
            Self::Panicked(message) => write!(f, "container load panicked: {message}"),
            Self::Unscheduled => write!(f, "scheduler dropped the load before it finished"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err.as_ref()),
            Self::Malformed(err) => Some(err.as_ref()),
            Self::Panicked(_) | Self::Unscheduled => None,
        }
    }
}

impl From<StoreError> for LoadError {
    fn from(value: StoreError) -> Self {
        Self::Store(Arc::new(value))
    }
}

impl From<MalformedFormatError> for LoadError {
    fn from(value: MalformedFormatError) -> Self {
        Self::Malformed(Arc::new(value))
    }
}

/// Callback receiving a load outcome on the affinity thread.
///
/// Two continuations are equal only when they are clones of the same
/// callback allocation.
#[derive(Clone)]
pub struct Continuation {
    callback: Arc<dyn Fn(LoadOutcome) + Send + Sync>,
}

impl Continuation {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(LoadOutcome) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn invoke(&self, outcome: LoadOutcome) {
        (self.callback)(outcome);
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }
}

impl PartialEq for Continuation {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Continuation {}

impl Hash for Continuation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl Debug for Continuation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Continuation").field(&self.identity()).finish()
    }
}

/// One caller's interest in a container.
///
/// Equal requests (same owner, group and continuation) are merged. The owner
/// name is ASCII-lowercased on construction, matching [`ContainerKey`], so
/// `Alex` and `alex` with one continuation are the same request.
///
/// [`ContainerKey`]: crate::loader::ContainerKey
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadRequest {
    owner_name: String,
    group: GroupId,
    continuation: Continuation,
}

impl LoadRequest {
    pub fn new(owner_name: impl Into<String>, group: GroupId, continuation: Continuation) -> Self {
        Self {
            owner_name: owner_name.into().to_ascii_lowercase(),
            group,
            continuation,
        }
    }

    /// Lowercased owner name.
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    pub(crate) fn into_continuation(self) -> Continuation {
        self.continuation
    }
}
