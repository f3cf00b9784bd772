//! Managed resource descriptors
//!
//! A descriptor supplies everything the reconciler needs to know about the
//! resource whose dependent objects it maintains: names, namespace, labels
//! and annotations. Every accessor is a pure function of the descriptor, so
//! calling it twice yields the same value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_MANAGED_BY_VALUE, LABEL_NAME};

/// Capability contract for a resource whose security objects are reconciled
pub trait ManagedResource: Send + Sync {
    /// Annotations copied onto every dependent object
    fn annotations(&self) -> BTreeMap<String, String>;

    /// Labels copied onto every dependent object
    fn labels(&self) -> BTreeMap<String, String>;

    /// Qualified name; names the ClusterRole and ClusterRoleBinding
    fn prefixed_name(&self) -> String;

    /// Name of the ServiceAccount the workload runs as
    fn service_account_name(&self) -> String;

    /// Name of the PodSecurityPolicy the workload uses
    fn psp_name(&self) -> String;

    /// Namespace of the resource and its ServiceAccount
    fn namespace(&self) -> String;

    /// Whether this resource manages its own PodSecurityPolicy
    ///
    /// A resource that points at any other policy name references a policy
    /// someone else created, and that policy must never be mutated.
    fn owns_psp(&self) -> bool {
        self.psp_name() == self.prefixed_name()
    }
}

/// Descriptor loaded from configuration
///
/// ```yaml
/// name: app1
/// namespace: monitoring
/// prefix: vmagent            # optional, qualified name becomes vmagent-app1
/// serviceAccountName: agent  # optional, defaults to the qualified name
/// podSecurityPolicyName: restricted  # optional, defaults to the qualified name
/// labels:
///   team: observability
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Optional prefix for the qualified name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// ServiceAccount override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// PodSecurityPolicy override, pointing at an externally managed policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_policy_name: Option<String>,
    /// Extra labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Extra annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Create a descriptor with default derived names
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the qualified-name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Use an explicit ServiceAccount name
    pub fn with_service_account(mut self, name: impl Into<String>) -> Self {
        self.service_account_name = Some(name.into());
        self
    }

    /// Reference a PodSecurityPolicy by name
    pub fn with_psp(mut self, name: impl Into<String>) -> Self {
        self.pod_security_policy_name = Some(name.into());
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

impl ManagedResource for ResourceDescriptor {
    fn annotations(&self) -> BTreeMap<String, String> {
        self.annotations.clone()
    }

    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_NAME.to_string(), self.prefixed_name());
        labels.insert(LABEL_INSTANCE.to_string(), self.name.clone());
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_VALUE.to_string(),
        );
        labels.extend(self.labels.clone());
        labels
    }

    fn prefixed_name(&self) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}-{}", prefix, self.name),
            _ => self.name.clone(),
        }
    }

    fn service_account_name(&self) -> String {
        self.service_account_name
            .clone()
            .unwrap_or_else(|| self.prefixed_name())
    }

    fn psp_name(&self) -> String {
        self.pod_security_policy_name
            .clone()
            .unwrap_or_else(|| self.prefixed_name())
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_default_to_the_resource_name() {
        let d = ResourceDescriptor::new("app1", "default");
        assert_eq!(d.prefixed_name(), "app1");
        assert_eq!(d.service_account_name(), "app1");
        assert_eq!(d.psp_name(), "app1");
        assert!(d.owns_psp());
    }

    #[test]
    fn test_prefix_qualifies_every_derived_name() {
        let d = ResourceDescriptor::new("app1", "monitoring").with_prefix("vmagent");
        assert_eq!(d.prefixed_name(), "vmagent-app1");
        assert_eq!(d.service_account_name(), "vmagent-app1");
        assert_eq!(d.psp_name(), "vmagent-app1");

        // an empty prefix is the same as none
        let d = ResourceDescriptor::new("app1", "monitoring").with_prefix("");
        assert_eq!(d.prefixed_name(), "app1");
    }

    /// Story: pointing a resource at a shared policy gives up ownership of it
    #[test]
    fn story_referencing_a_foreign_policy_disowns_it() {
        let d = ResourceDescriptor::new("app1", "default").with_psp("restricted");
        assert_eq!(d.psp_name(), "restricted");
        assert!(!d.owns_psp());

        // naming our own default explicitly keeps ownership
        let d = ResourceDescriptor::new("app1", "default").with_psp("app1");
        assert!(d.owns_psp());
    }

    #[test]
    fn test_derived_names_are_stable() {
        let d = ResourceDescriptor::new("app1", "ns")
            .with_prefix("p")
            .with_service_account("sa");
        assert_eq!(d.prefixed_name(), d.prefixed_name());
        assert_eq!(d.service_account_name(), "sa");
        assert_eq!(d.labels(), d.labels());
    }

    #[test]
    fn test_labels_include_standard_labels_and_user_labels_win() {
        let d = ResourceDescriptor::new("app1", "ns")
            .with_prefix("vmagent")
            .with_label("team", "obs")
            .with_label(LABEL_MANAGED_BY, "someone-else");
        let labels = d.labels();
        assert_eq!(labels.get(LABEL_NAME).map(String::as_str), Some("vmagent-app1"));
        assert_eq!(labels.get(LABEL_INSTANCE).map(String::as_str), Some("app1"));
        assert_eq!(labels.get("team").map(String::as_str), Some("obs"));
        assert_eq!(
            labels.get(LABEL_MANAGED_BY).map(String::as_str),
            Some("someone-else")
        );
    }

    #[test]
    fn test_descriptor_parses_from_yaml() {
        let yaml = r#"
name: app1
namespace: monitoring
prefix: vmagent
podSecurityPolicyName: restricted
annotations:
  note: hello
"#;
        let d: ResourceDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.prefixed_name(), "vmagent-app1");
        assert_eq!(d.psp_name(), "restricted");
        assert_eq!(d.service_account_name(), "vmagent-app1");
        assert_eq!(d.annotations().get("note").map(String::as_str), Some("hello"));
        assert!(d.labels.is_empty());
    }
}
