//! Managed object kinds
//!
//! The reconciler maintains four kinds: PodSecurityPolicy, ServiceAccount,
//! ClusterRole and ClusterRoleBinding. [`ManagedKind`] is the seam that lets
//! the store and the ensure operations treat them uniformly.

mod psp;

use std::fmt;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use psp::{PodSecurityPolicy, PodSecurityPolicySpec, StrategyOptions, DEFAULT_VOLUMES};

/// A Kubernetes kind the reconciler can look up, create and update
pub trait ManagedKind:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Build an API handle for this kind
    ///
    /// `namespace` is ignored by cluster-scoped kinds. For namespaced kinds
    /// `None` addresses all namespaces, which is only valid for listing.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    /// Kind name used in logs and store keys
    fn kind_name() -> String {
        Self::kind(&()).into_owned()
    }
}

impl ManagedKind for ServiceAccount {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

impl ManagedKind for ClusterRole {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

impl ManagedKind for ClusterRoleBinding {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

impl ManagedKind for PodSecurityPolicy {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

/// Address of an object in the store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key of a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of an existing object, read from its metadata
    pub fn of<K: Resource>(object: &K) -> Self {
        let meta = object.meta();
        Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }

    /// Whether `object` lives at this key
    ///
    /// Names must match exactly. A cluster-scoped key ignores namespaces.
    pub fn matches<K: Resource>(&self, object: &K) -> bool {
        let meta = object.meta();
        if meta.name.as_deref() != Some(self.name.as_str()) {
            return false;
        }
        match &self.namespace {
            Some(ns) => meta.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}
