//! Error types for psp-reconciler

use std::fmt;

use thiserror::Error;

/// Reconciliation step that produced an error
///
/// Rendered lowercase so messages read like `failed check clusterrole: ...`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Ensuring the ServiceAccount (identity)
    ServiceAccount,
    /// Ensuring the PodSecurityPolicy (access policy)
    Policy,
    /// Ensuring the ClusterRole
    ClusterRole,
    /// Ensuring the ClusterRoleBinding
    ClusterRoleBinding,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::ServiceAccount => "serviceaccount",
            Step::Policy => "policy",
            Step::ClusterRole => "clusterrole",
            Step::ClusterRoleBinding => "clusterrolebinding",
        };
        f.write_str(s)
    }
}

/// Main error type for reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object store error that did not come from the Kubernetes API
    #[error("store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An ensure step failed; the source is the underlying store error
    #[error("failed check {step}: {source}")]
    Step {
        /// The step that failed
        step: Step,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a store error with the given message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Wrap this error with the step that produced it
    pub fn in_step(self, step: Step) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The outermost step this error is attributed to, if any
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// True when the underlying cause is a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            Self::Step { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
