//! psp-reconciler - keeps the security objects of a managed resource in place
//!
//! A managed resource (described by a [`ManagedResource`]) depends on four
//! cluster objects: a PodSecurityPolicy, a ServiceAccount, a ClusterRole that
//! grants `use` on the policy, and a ClusterRoleBinding tying the two
//! together. This crate ensures those objects exist and stay consistent with
//! the desired state, without clobbering fields other actors own.
//!
//! # Reconciliation model
//!
//! Every ensure operation is idempotent:
//! - absent objects are created from the desired state
//! - present objects are merged (labels, annotations, finalizers) and updated
//! - a PodSecurityPolicy the resource does not own is never touched
//!
//! Objects are marked with the [`FINALIZER_NAME`] ownership token. Nothing is
//! ever deleted here; finalization belongs to the enclosing controller.
//!
//! # Modules
//!
//! - [`descriptor`] - The managed resource capability trait and a YAML-backed descriptor
//! - [`resources`] - Managed object kinds, object keys, and the PodSecurityPolicy type
//! - [`builders`] - Desired-state builders for the four managed kinds
//! - [`merge`] - Pure metadata merge and ownership helpers
//! - [`store`] - Object store boundary (Kubernetes and in-memory implementations)
//! - [`reconcile`] - The ensure operations
//! - [`retry`] - Backoff helper for the enclosing reconcile loop
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod builders;
pub mod descriptor;
pub mod error;
pub mod merge;
pub mod reconcile;
pub mod resources;
pub mod retry;
pub mod store;

pub use descriptor::{ManagedResource, ResourceDescriptor};
pub use error::{Error, Step};
pub use reconcile::{
    ensure_all, ensure_cluster_role_binding_exists, ensure_cluster_role_exists, ensure_identity,
    ensure_policy_exists, EnsureOutcome,
};
pub use resources::{ManagedKind, ObjectKey, PodSecurityPolicy};
pub use store::{KubeStore, MemoryStore, ObjectStore};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-known names
// =============================================================================

/// Finalizer marking an object as managed by this reconciler
///
/// Its presence is the ownership token checked by [`merge::is_managed`].
pub const FINALIZER_NAME: &str = "psp-reconciler.dev/finalizer";

/// Standard label carrying the qualified resource name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard label carrying the descriptor's own name
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label naming the managing controller
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on every object this crate builds
pub const LABEL_MANAGED_BY_VALUE: &str = "psp-reconciler";
