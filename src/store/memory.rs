//! In-process ObjectStore
//!
//! Keeps objects as JSON keyed by kind and [`ObjectKey`], records every
//! operation, and can be told to fail specific calls. Used to render the
//! desired state without a cluster and to exercise the reconciler in tests.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::ObjectStore;
use crate::resources::{ManagedKind, ObjectKey};
use crate::Error;

/// Store operation kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// Indexed get
    Get,
    /// Full listing
    List,
    /// Create
    Create,
    /// Update
    Update,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
        };
        f.write_str(s)
    }
}

/// One recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOperation {
    /// What was done
    pub verb: Verb,
    /// Kind it was done to
    pub kind: String,
    /// Target key; `None` for listings
    pub key: Option<ObjectKey>,
}

#[derive(Debug)]
struct InjectedFailure {
    verb: Verb,
    kind: String,
    message: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(String, ObjectKey), Value>,
    operations: Vec<StoreOperation>,
    failures: Vec<InjectedFailure>,
}

/// ObjectStore holding everything in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    scan_only: bool,
}

impl MemoryStore {
    /// Create an empty store supporting indexed gets
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that can only be searched by listing
    pub fn scan_only() -> Self {
        Self {
            scan_only: true,
            ..Self::default()
        }
    }

    /// Seed an object without recording an operation
    ///
    /// Replaces any object already stored at the same key.
    pub fn insert<K: ManagedKind>(&self, object: &K) -> Result<(), Error> {
        let value = to_value(object)?;
        self.inner
            .lock()
            .objects
            .insert((K::kind_name(), ObjectKey::of(object)), value);
        Ok(())
    }

    /// Read an object back without recording an operation
    pub fn object<K: ManagedKind>(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        let inner = self.inner.lock();
        inner
            .objects
            .get(&(K::kind_name(), key.clone()))
            .map(|value| from_value(value.clone()))
            .transpose()
    }

    /// Every stored object as JSON, ordered by kind then key
    pub fn objects(&self) -> Vec<Value> {
        self.inner.lock().objects.values().cloned().collect()
    }

    /// Every operation recorded so far
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.inner.lock().operations.clone()
    }

    /// Number of recorded operations with the given verb on kind `K`
    pub fn count<K: ManagedKind>(&self, verb: Verb) -> usize {
        let kind = K::kind_name();
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| op.verb == verb && op.kind == kind)
            .count()
    }

    /// Number of recorded mutations (creates and updates) of any kind
    pub fn mutations(&self) -> usize {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| matches!(op.verb, Verb::Create | Verb::Update))
            .count()
    }

    /// Forget recorded operations
    pub fn clear_operations(&self) {
        self.inner.lock().operations.clear();
    }

    /// Make every subsequent `verb` on kind `K` fail with `message`
    pub fn fail_on<K: ManagedKind>(&self, verb: Verb, message: impl Into<String>) {
        self.inner.lock().failures.push(InjectedFailure {
            verb,
            kind: K::kind_name(),
            message: message.into(),
        });
    }

    /// Drop every injected failure
    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    /// Record an operation, then return the injected failure for it, if any
    fn record(&self, verb: Verb, kind: String, key: Option<ObjectKey>) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let failure = inner
            .failures
            .iter()
            .find(|f| f.verb == verb && f.kind == kind)
            .map(|f| Error::store(f.message.clone()));
        inner.operations.push(StoreOperation { verb, kind, key });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn to_value<K: ManagedKind>(object: &K) -> Result<Value, Error> {
    serde_json::to_value(object).map_err(|e| Error::serialization(e.to_string()))
}

fn from_value<K: ManagedKind>(value: Value) -> Result<K, Error> {
    serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))
}

#[async_trait]
impl<K: ManagedKind> ObjectStore<K> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        self.record(Verb::Get, K::kind_name(), Some(key.clone()))?;
        self.object(key)
    }

    async fn list_all(&self) -> Result<Vec<K>, Error> {
        let kind = K::kind_name();
        self.record(Verb::List, kind.clone(), None)?;
        let inner = self.inner.lock();
        inner
            .objects
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, value)| from_value(value.clone()))
            .collect()
    }

    async fn create(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        self.record(Verb::Create, K::kind_name(), Some(key.clone()))?;
        let value = to_value(object)?;
        let mut inner = self.inner.lock();
        let slot = (K::kind_name(), key);
        if inner.objects.contains_key(&slot) {
            return Err(Error::store(format!(
                "{} {} already exists",
                slot.0, slot.1
            )));
        }
        inner.objects.insert(slot, value);
        Ok(())
    }

    async fn update(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        self.record(Verb::Update, K::kind_name(), Some(key.clone()))?;
        let value = to_value(object)?;
        let mut inner = self.inner.lock();
        let slot = (K::kind_name(), key);
        match inner.objects.get_mut(&slot) {
            Some(existing) => {
                *existing = value;
                Ok(())
            }
            None => Err(Error::store(format!("{} {} not found", slot.0, slot.1))),
        }
    }

    fn supports_indexed_get(&self) -> bool {
        !self.scan_only
    }
}
