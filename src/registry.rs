use crate::error::{EdcError, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An opaque, monotonically increasing identifier for an instance held by a [`Registry<T>`].
///
/// Handles are never reused within a process lifetime (§4.4); destroying an instance and
/// looking it up afterwards returns [`EdcError::UnknownHandle`].
pub struct Handle<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn new(id: u64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<T> serde::Serialize for Handle<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.id)
    }
}

impl<'de, T> serde::Deserialize<'de> for Handle<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let id = u64::deserialize(deserializer)?;
        Ok(Handle::new(id))
    }
}

/// A process-wide, per-kind table mapping handles to instances (§4.4).
///
/// Structural changes (insert/destroy) take the table's own lock; each stored instance has
/// its own lock so a long-running read (e.g. a query) does not block unrelated lookups.
/// Keyed by `ahash` rather than `std`'s SipHash: handle lookups sit on the hot path of every
/// wire operation and the keys are already process-local `u64`s with no adversarial input.
pub struct Registry<T> {
    next_id: AtomicU64,
    entries: RwLock<IndexMap<u64, Arc<RwLock<T>>, ahash::RandomState>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(IndexMap::default()),
        }
    }

    pub fn insert(&self, value: T) -> Handle<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(id, Arc::new(RwLock::new(value)));
        log::debug!("registry: created handle {id}");
        Handle::new(id)
    }

    /// Returns a clone of the `Arc` guarding the instance; callers take their own read/write
    /// lock on it. Returns [`EdcError::UnknownHandle`] if the handle was never issued or has
    /// been destroyed.
    pub fn get(&self, handle: Handle<T>) -> Result<Arc<RwLock<T>>> {
        self.entries
            .read()
            .get(&handle.id)
            .cloned()
            .ok_or(EdcError::UnknownHandle { handle: handle.id })
    }

    pub fn destroy(&self, handle: Handle<T>) -> Result<()> {
        self.entries
            .write()
            .shift_remove(&handle.id)
            .map(|_| {
                log::debug!("registry: destroyed handle {}", handle.id);
            })
            .ok_or(EdcError::UnknownHandle { handle: handle.id })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use crate::evidence_network::EvidenceNetwork;
use crate::fuzzy::FuzzyInferenceEngine;
use crate::optimizer::MetacognitiveOptimizer;

/// The three per-kind registries the core exposes, bundled into one process-wide default.
///
/// A caller is never required to use this default: `Registry::new()` works standalone for
/// callers that want isolated state (e.g. tests).
#[derive(Default)]
pub struct DefaultRegistries {
    pub fuzzy_engines: Registry<FuzzyInferenceEngine>,
    pub networks: Registry<EvidenceNetwork>,
    pub optimizers: Registry<MetacognitiveOptimizer>,
}

static DEFAULT_REGISTRIES: Lazy<DefaultRegistries> = Lazy::new(DefaultRegistries::default);

pub fn default_registries() -> &'static DefaultRegistries {
    &DEFAULT_REGISTRIES
}
