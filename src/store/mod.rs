//! Object store boundary
//!
//! The reconciler only needs four operations per kind: get, list, create and
//! update. [`ObjectStore`] abstracts them so the ensure logic can run against
//! the Kubernetes API ([`KubeStore`]) or an in-process map ([`MemoryStore`]).

mod kube_store;
mod memory;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::resources::{ManagedKind, ObjectKey};
use crate::Error;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, StoreOperation, Verb};

/// Store operations for one managed kind
///
/// Not-found is not an error: `get` returns `Ok(None)`. Every other failure
/// is returned as-is and never retried here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore<K: ManagedKind>: Send + Sync {
    /// Fetch one object by key
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error>;

    /// List every object of the kind
    async fn list_all(&self) -> Result<Vec<K>, Error>;

    /// Create an object that does not exist yet
    async fn create(&self, object: &K) -> Result<(), Error>;

    /// Replace an existing object
    async fn update(&self, object: &K) -> Result<(), Error>;

    /// Whether `get` can address the object directly
    ///
    /// Stores that return false are searched with `list_all` instead.
    fn supports_indexed_get(&self) -> bool {
        true
    }
}

/// Find the object at `key`
///
/// Uses an indexed get when the store supports it, otherwise scans every
/// object of the kind and returns the first exact name match.
pub async fn lookup<K, S>(store: &S, key: &ObjectKey) -> Result<Option<K>, Error>
where
    K: ManagedKind,
    S: ObjectStore<K> + ?Sized,
{
    if store.supports_indexed_get() {
        return store.get(key).await;
    }
    let objects = store.list_all().await?;
    Ok(objects.into_iter().find(|object| key.matches(object)))
}
