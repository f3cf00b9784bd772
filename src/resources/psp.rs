//! PodSecurityPolicy (`policy/v1beta1`)
//!
//! k8s-openapi dropped this kind together with Kubernetes 1.25, so it is
//! declared here with only the fields the reconciler writes. Unknown fields
//! on policies read back from the cluster are ignored.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Volume sources every managed policy allows
pub const DEFAULT_VOLUMES: [&str; 7] = [
    "persistentVolumeClaim",
    "secret",
    "emptyDir",
    "configMap",
    "projected",
    "downwardAPI",
    "nfs",
];

/// Specification of a PodSecurityPolicy
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "policy",
    version = "v1beta1",
    kind = "PodSecurityPolicy",
    plural = "podsecuritypolicies",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityPolicySpec {
    /// Whether a process may gain more privileges than its parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privilege_escalation: Option<bool>,

    /// Whether pods may use the host network namespace
    #[serde(default)]
    pub host_network: bool,

    /// Whether pods may use the host PID namespace
    #[serde(default, rename = "hostPID")]
    pub host_pid: bool,

    /// Whether pods may use the host IPC namespace
    #[serde(default, rename = "hostIPC")]
    pub host_ipc: bool,

    /// Whether containers must run with a read-only root filesystem
    #[serde(default)]
    pub read_only_root_filesystem: bool,

    /// Strategy for the user a container runs as
    pub run_as_user: StrategyOptions,

    /// Strategy for the SELinux context
    #[serde(rename = "seLinux")]
    pub se_linux: StrategyOptions,

    /// Strategy for supplemental groups
    pub supplemental_groups: StrategyOptions,

    /// Strategy for the filesystem group
    pub fs_group: StrategyOptions,

    /// Capabilities dropped from every container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_drop_capabilities: Vec<String>,

    /// Allowed volume source types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

/// Rule of a PodSecurityPolicy strategy (`RunAsAny`, `MustRunAs`, ...)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StrategyOptions {
    /// Strategy rule
    pub rule: String,
}

impl StrategyOptions {
    /// The permissive `RunAsAny` strategy
    pub fn run_as_any() -> Self {
        Self {
            rule: "RunAsAny".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_policy_is_addressed_as_policy_v1beta1() {
        assert_eq!(PodSecurityPolicy::api_version(&()), "policy/v1beta1");
        assert_eq!(PodSecurityPolicy::plural(&()), "podsecuritypolicies");
    }

    #[test]
    fn test_spec_uses_kubernetes_field_names() {
        let spec = PodSecurityPolicySpec {
            host_pid: true,
            se_linux: StrategyOptions::run_as_any(),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["hostPID"], true);
        assert_eq!(json["hostIPC"], false);
        assert_eq!(json["seLinux"]["rule"], "RunAsAny");
        assert!(json.get("requiredDropCapabilities").is_none());
    }

    /// Story: policies written by other tools carry fields we never model,
    /// and reading them back must not fail.
    #[test]
    fn story_foreign_policy_fields_are_ignored() {
        let json = serde_json::json!({
            "apiVersion": "policy/v1beta1",
            "kind": "PodSecurityPolicy",
            "metadata": { "name": "restricted" },
            "spec": {
                "privileged": false,
                "runAsUser": { "rule": "MustRunAsNonRoot" },
                "seLinux": { "rule": "RunAsAny" },
                "supplementalGroups": { "rule": "MustRunAs", "ranges": [{ "min": 1, "max": 65535 }] },
                "fsGroup": { "rule": "RunAsAny" },
                "volumes": ["hostPath", "*"]
            }
        });
        let psp: PodSecurityPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(psp.spec.run_as_user.rule, "MustRunAsNonRoot");
        assert_eq!(psp.spec.volumes, vec!["hostPath", "*"]);
    }
}
