//! Desired-state builders for the managed kinds
//!
//! Each builder produces the object as it should look when freshly created:
//! descriptor labels and annotations, the ownership finalizer, and the
//! kind-specific fields. Merging with an existing object happens later.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use kube::api::ObjectMeta;

use crate::descriptor::ManagedResource;
use crate::resources::{PodSecurityPolicy, PodSecurityPolicySpec, StrategyOptions, DEFAULT_VOLUMES};
use crate::FINALIZER_NAME;

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn non_empty(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then_some(map)
}

fn desired_meta<D>(descriptor: &D, name: String, namespace: Option<String>) -> ObjectMeta
where
    D: ManagedResource + ?Sized,
{
    ObjectMeta {
        name: Some(name),
        namespace,
        labels: non_empty(descriptor.labels()),
        annotations: non_empty(descriptor.annotations()),
        finalizers: Some(vec![FINALIZER_NAME.to_string()]),
        ..Default::default()
    }
}

/// ServiceAccount the managed workload runs as
pub fn build_service_account<D>(descriptor: &D) -> ServiceAccount
where
    D: ManagedResource + ?Sized,
{
    ServiceAccount {
        metadata: desired_meta(
            descriptor,
            descriptor.service_account_name(),
            Some(descriptor.namespace()),
        ),
        ..Default::default()
    }
}

/// PodSecurityPolicy with the fixed security posture
///
/// No privilege escalation and every capability dropped, but host
/// networking is allowed and user/group strategies are unrestricted.
pub fn build_pod_security_policy<D>(descriptor: &D) -> PodSecurityPolicy
where
    D: ManagedResource + ?Sized,
{
    let spec = PodSecurityPolicySpec {
        allow_privilege_escalation: Some(false),
        host_network: true,
        host_pid: false,
        host_ipc: false,
        read_only_root_filesystem: false,
        run_as_user: StrategyOptions::run_as_any(),
        se_linux: StrategyOptions::run_as_any(),
        supplemental_groups: StrategyOptions::run_as_any(),
        fs_group: StrategyOptions::run_as_any(),
        required_drop_capabilities: vec!["ALL".to_string()],
        volumes: DEFAULT_VOLUMES.iter().map(|v| v.to_string()).collect(),
    };
    PodSecurityPolicy {
        metadata: desired_meta(descriptor, descriptor.psp_name(), None),
        spec,
    }
}

/// ClusterRole granting `use` on the descriptor's policy and nothing else
pub fn build_cluster_role<D>(descriptor: &D) -> ClusterRole
where
    D: ManagedResource + ?Sized,
{
    ClusterRole {
        metadata: desired_meta(descriptor, descriptor.prefixed_name(), None),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["policy".to_string()]),
            resources: Some(vec!["podsecuritypolicies".to_string()]),
            verbs: vec!["use".to_string()],
            resource_names: Some(vec![descriptor.psp_name()]),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// ClusterRoleBinding subjecting the ServiceAccount to the ClusterRole
pub fn build_cluster_role_binding<D>(descriptor: &D) -> ClusterRoleBinding
where
    D: ManagedResource + ?Sized,
{
    ClusterRoleBinding {
        metadata: desired_meta(descriptor, descriptor.prefixed_name(), None),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: descriptor.prefixed_name(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: descriptor.service_account_name(),
            namespace: Some(descriptor.namespace()),
            api_group: None,
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ResourceDescriptor;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("app1", "monitoring")
            .with_prefix("vmagent")
            .with_annotation("note", "hello")
    }

    #[test]
    fn test_service_account_is_namespaced_and_owned() {
        let sa = build_service_account(&descriptor());
        assert_eq!(sa.metadata.name.as_deref(), Some("vmagent-app1"));
        assert_eq!(sa.metadata.namespace.as_deref(), Some("monitoring"));
        assert_eq!(
            sa.metadata.finalizers,
            Some(vec![FINALIZER_NAME.to_string()])
        );
        assert_eq!(
            sa.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get("note"))
                .map(String::as_str),
            Some("hello")
        );
        assert!(sa.secrets.is_none());
    }

    #[test]
    fn test_policy_has_fixed_security_posture() {
        let psp = build_pod_security_policy(&descriptor());
        assert_eq!(psp.metadata.name.as_deref(), Some("vmagent-app1"));
        assert_eq!(psp.metadata.namespace, None);
        assert_eq!(psp.spec.allow_privilege_escalation, Some(false));
        assert!(psp.spec.host_network);
        assert!(!psp.spec.host_pid);
        assert!(!psp.spec.host_ipc);
        assert!(!psp.spec.read_only_root_filesystem);
        assert_eq!(psp.spec.required_drop_capabilities, vec!["ALL"]);
        for strategy in [
            &psp.spec.run_as_user,
            &psp.spec.se_linux,
            &psp.spec.supplemental_groups,
            &psp.spec.fs_group,
        ] {
            assert_eq!(strategy.rule, "RunAsAny");
        }
        assert_eq!(
            psp.spec.volumes,
            vec![
                "persistentVolumeClaim",
                "secret",
                "emptyDir",
                "configMap",
                "projected",
                "downwardAPI",
                "nfs"
            ]
        );
    }

    #[test]
    fn test_policy_is_named_after_the_configured_policy() {
        let psp = build_pod_security_policy(&descriptor().with_psp("restricted"));
        assert_eq!(psp.metadata.name.as_deref(), Some("restricted"));
    }

    #[test]
    fn test_cluster_role_grants_use_on_configured_policy() {
        let role = build_cluster_role(&descriptor().with_psp("restricted"));
        assert_eq!(role.metadata.name.as_deref(), Some("vmagent-app1"));
        assert_eq!(role.metadata.namespace, None);

        let rules = role.rules.unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.api_groups, Some(vec!["policy".to_string()]));
        assert_eq!(
            rule.resources,
            Some(vec!["podsecuritypolicies".to_string()])
        );
        assert_eq!(rule.verbs, vec!["use"]);
        assert_eq!(rule.resource_names, Some(vec!["restricted".to_string()]));
    }

    #[test]
    fn test_binding_subjects_service_account_to_role() {
        let binding = build_cluster_role_binding(&descriptor().with_service_account("agent"));
        assert_eq!(binding.metadata.name.as_deref(), Some("vmagent-app1"));
        assert_eq!(binding.role_ref.api_group, "rbac.authorization.k8s.io");
        assert_eq!(binding.role_ref.kind, "ClusterRole");
        assert_eq!(binding.role_ref.name, "vmagent-app1");

        let subjects = binding.subjects.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].kind, "ServiceAccount");
        assert_eq!(subjects[0].name, "agent");
        assert_eq!(subjects[0].namespace.as_deref(), Some("monitoring"));
    }

    #[test]
    fn test_empty_annotations_are_omitted() {
        let role = build_cluster_role(&ResourceDescriptor::new("app1", "default"));
        assert_eq!(role.metadata.annotations, None);
        assert!(role.metadata.labels.is_some());
    }
}
