//! Metadata merge rules and the ownership predicate
//!
//! Merging is deliberately asymmetric:
//! - annotations: desired values win over existing ones
//! - labels: existing values win over desired ones, so labels set by other
//!   actors survive reconciliation
//! - finalizers: the ownership token is appended once, others are kept
//!
//! All functions here are pure so the rules can be tested without a store.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;

use crate::FINALIZER_NAME;

/// Whether an object carries the ownership token
pub fn is_managed(meta: &ObjectMeta) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == FINALIZER_NAME))
}

/// Overlay `overlay` on top of `base`; `overlay` wins on key collision
///
/// Returns `None` when the result is empty so an absent map stays absent.
pub fn merge_maps(
    base: Option<&BTreeMap<String, String>>,
    overlay: Option<&BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    let mut merged = base.cloned().unwrap_or_default();
    if let Some(overlay) = overlay {
        merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    (!merged.is_empty()).then_some(merged)
}

/// Existing finalizers plus `token`, without duplicating it
pub fn merge_finalizers(existing: Option<&Vec<String>>, token: &str) -> Vec<String> {
    let mut finalizers = existing.cloned().unwrap_or_default();
    if !finalizers.iter().any(|f| f == token) {
        finalizers.push(token.to_string());
    }
    finalizers
}

/// Merge `existing` metadata into `desired` using the standard rules
pub fn merge_metadata(desired: &mut ObjectMeta, existing: &ObjectMeta) {
    desired.annotations = merge_maps(existing.annotations.as_ref(), desired.annotations.as_ref());
    desired.labels = merge_maps(desired.labels.as_ref(), existing.labels.as_ref());
    desired.finalizers = Some(merge_finalizers(
        existing.finalizers.as_ref(),
        FINALIZER_NAME,
    ));
}

/// Merge rules for an owned PodSecurityPolicy
///
/// Identical to [`merge_metadata`] except that the existing policy's
/// *labels* are layered over the desired annotations, winning on collision;
/// its existing annotations are dropped. Policies have always been
/// reconciled this way and the behavior is kept until the owners of the
/// merge rules decide otherwise.
pub fn merge_policy_metadata(desired: &mut ObjectMeta, existing: &ObjectMeta) {
    desired.annotations = merge_maps(desired.annotations.as_ref(), existing.labels.as_ref());
    desired.labels = merge_maps(desired.labels.as_ref(), existing.labels.as_ref());
    desired.finalizers = Some(merge_finalizers(
        existing.finalizers.as_ref(),
        FINALIZER_NAME,
    ));
}
