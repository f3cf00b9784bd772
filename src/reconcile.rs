//! Ensure operations for the managed objects
//!
//! Each operation builds the desired object, looks up the existing one and
//! either creates it, merges and updates it, or (for a foreign
//! PodSecurityPolicy) leaves it alone. Operations are idempotent and hold no
//! state between calls, so a failed pass is simply retried as a whole by the
//! caller.

use std::fmt;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use tracing::{debug, info, instrument};

use crate::builders::{
    build_cluster_role, build_cluster_role_binding, build_pod_security_policy,
    build_service_account,
};
use crate::descriptor::ManagedResource;
use crate::merge::{is_managed, merge_metadata, merge_policy_metadata};
use crate::resources::{ManagedKind, ObjectKey, PodSecurityPolicy};
use crate::store::{lookup, ObjectStore};
use crate::{Result, Step};

/// What an ensure operation did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed without the ownership token; it was merged and
    /// updated, which added the token
    Adopted,
    /// The object was already managed and was merged and updated
    Updated,
    /// The object belongs to someone else and was left untouched
    Skipped,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnsureOutcome::Created => "created",
            EnsureOutcome::Adopted => "adopted",
            EnsureOutcome::Updated => "updated",
            EnsureOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Ensure the PodSecurityPolicy, ClusterRole and ClusterRoleBinding
///
/// Steps run in that order and stop at the first failure, which is returned
/// wrapped in [`crate::Error::Step`]. Objects written by earlier steps are
/// kept. The ServiceAccount is handled separately by [`ensure_identity`].
#[instrument(
    skip_all,
    fields(name = %descriptor.prefixed_name(), namespace = %descriptor.namespace())
)]
pub async fn ensure_all<D, S>(descriptor: &D, store: &S) -> Result<()>
where
    D: ManagedResource + ?Sized,
    S: ObjectStore<PodSecurityPolicy>
        + ObjectStore<ClusterRole>
        + ObjectStore<ClusterRoleBinding>
        + ?Sized,
{
    ensure_policy_exists(descriptor, store)
        .await
        .map_err(|e| e.in_step(Step::Policy))?;
    ensure_cluster_role_exists(descriptor, store)
        .await
        .map_err(|e| e.in_step(Step::ClusterRole))?;
    ensure_cluster_role_binding_exists(descriptor, store)
        .await
        .map_err(|e| e.in_step(Step::ClusterRoleBinding))?;
    Ok(())
}

/// Ensure the ServiceAccount exists and is merged with the desired state
///
/// Secrets and image pull secrets are always carried over from the existing
/// account; they are managed by the token controller, not by us.
#[instrument(
    skip_all,
    fields(name = %descriptor.service_account_name(), namespace = %descriptor.namespace())
)]
pub async fn ensure_identity<D, S>(descriptor: &D, store: &S) -> Result<EnsureOutcome>
where
    D: ManagedResource + ?Sized,
    S: ObjectStore<ServiceAccount> + ?Sized,
{
    let desired = build_service_account(descriptor);
    reconcile_identity(store, desired)
        .await
        .map_err(|e| e.in_step(Step::ServiceAccount))
}

async fn reconcile_identity<S>(store: &S, desired: ServiceAccount) -> Result<EnsureOutcome>
where
    S: ObjectStore<ServiceAccount> + ?Sized,
{
    let Some(existing) = find_existing(store, &desired).await? else {
        return create(store, &desired).await;
    };

    let mut merged = desired;
    merge_metadata(&mut merged.metadata, &existing.metadata);
    merged.secrets = existing.secrets.clone();
    merged.image_pull_secrets = existing.image_pull_secrets.clone();
    update(store, &merged, &existing).await
}

/// Ensure the PodSecurityPolicy exists
///
/// An existing policy is only updated when the descriptor owns it
/// ([`ManagedResource::owns_psp`]). A policy referenced by name but owned by
/// someone else is never mutated.
#[instrument(skip_all, fields(name = %descriptor.psp_name()))]
pub async fn ensure_policy_exists<D, S>(descriptor: &D, store: &S) -> Result<EnsureOutcome>
where
    D: ManagedResource + ?Sized,
    S: ObjectStore<PodSecurityPolicy> + ?Sized,
{
    let desired = build_pod_security_policy(descriptor);
    let Some(existing) = find_existing(store, &desired).await? else {
        return create(store, &desired).await;
    };

    if !descriptor.owns_psp() {
        debug!(
            psp = %descriptor.psp_name(),
            owner = %descriptor.prefixed_name(),
            "PodSecurityPolicy is not ours, leaving it untouched"
        );
        return Ok(EnsureOutcome::Skipped);
    }

    let mut merged = desired;
    merge_policy_metadata(&mut merged.metadata, &existing.metadata);
    update(store, &merged, &existing).await
}

/// Ensure the ClusterRole granting `use` on the policy exists
#[instrument(skip_all, fields(name = %descriptor.prefixed_name()))]
pub async fn ensure_cluster_role_exists<D, S>(descriptor: &D, store: &S) -> Result<EnsureOutcome>
where
    D: ManagedResource + ?Sized,
    S: ObjectStore<ClusterRole> + ?Sized,
{
    let desired = build_cluster_role(descriptor);
    let Some(existing) = find_existing(store, &desired).await? else {
        return create(store, &desired).await;
    };

    let mut merged = desired;
    merge_metadata(&mut merged.metadata, &existing.metadata);
    update(store, &merged, &existing).await
}

/// Ensure the ClusterRoleBinding for the ServiceAccount exists
#[instrument(skip_all, fields(name = %descriptor.prefixed_name()))]
pub async fn ensure_cluster_role_binding_exists<D, S>(
    descriptor: &D,
    store: &S,
) -> Result<EnsureOutcome>
where
    D: ManagedResource + ?Sized,
    S: ObjectStore<ClusterRoleBinding> + ?Sized,
{
    let desired = build_cluster_role_binding(descriptor);
    let Some(existing) = find_existing(store, &desired).await? else {
        return create(store, &desired).await;
    };

    let mut merged = desired;
    merge_metadata(&mut merged.metadata, &existing.metadata);
    update(store, &merged, &existing).await
}

async fn find_existing<K, S>(store: &S, desired: &K) -> Result<Option<K>>
where
    K: ManagedKind,
    S: ObjectStore<K> + ?Sized,
{
    lookup(store, &ObjectKey::of(desired)).await
}

async fn create<K, S>(store: &S, desired: &K) -> Result<EnsureOutcome>
where
    K: ManagedKind,
    S: ObjectStore<K> + ?Sized,
{
    store.create(desired).await?;
    info!(
        kind = %K::kind_name(),
        key = %ObjectKey::of(desired),
        outcome = %EnsureOutcome::Created,
        "ensured object"
    );
    Ok(EnsureOutcome::Created)
}

async fn update<K, S>(store: &S, merged: &K, existing: &K) -> Result<EnsureOutcome>
where
    K: ManagedKind,
    S: ObjectStore<K> + ?Sized,
{
    let outcome = if is_managed(existing.meta()) {
        EnsureOutcome::Updated
    } else {
        EnsureOutcome::Adopted
    };
    store.update(merged).await?;
    debug!(
        kind = %K::kind_name(),
        key = %ObjectKey::of(merged),
        outcome = %outcome,
        "ensured object"
    );
    Ok(outcome)
}
