//! ObjectStore backed by the Kubernetes API

use async_trait::async_trait;
use kube::api::{ListParams, PostParams};
use kube::Client;
use tracing::debug;

use super::ObjectStore;
use crate::resources::{ManagedKind, ObjectKey};
use crate::Error;

/// Kubernetes API store for every managed kind
///
/// Creates are POSTs and updates are unconditional replaces: the objects we
/// send carry no resourceVersion, so no optimistic-concurrency check is made.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a new KubeStore wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map a 404 from a get to `None`, passing every other failure through
fn found_or_none<K>(result: Result<K, kube::Error>) -> Result<Option<K>, Error> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(e) => {
            let err = Error::from(e);
            if err.is_not_found() {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<K: ManagedKind> ObjectStore<K> for KubeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, Error> {
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        found_or_none(api.get(&key.name).await)
    }

    async fn list_all(&self) -> Result<Vec<K>, Error> {
        let api = K::api(self.client.clone(), None);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        api.create(&PostParams::default(), object).await?;
        debug!(kind = %K::kind_name(), key = %key, "created object");
        Ok(())
    }

    async fn update(&self, object: &K) -> Result<(), Error> {
        let key = ObjectKey::of(object);
        let api = K::api(self.client.clone(), key.namespace.as_deref());
        api.replace(&key.name, &PostParams::default(), object).await?;
        debug!(kind = %K::kind_name(), key = %key, "replaced object");
        Ok(())
    }
}
