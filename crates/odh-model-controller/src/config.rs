//! Controller configuration resolved once at startup

use std::path::Path;

use odh_common::retry::RetryConfig;
use odh_common::DEFAULT_OPERATOR_NAMESPACE;

/// File the kubelet mounts with the pod's own namespace
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Settings shared by every reconcile pass
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Namespace holding the serving runtime catalogue
    pub operator_namespace: String,
    /// Enroll namespaces in the service mesh
    pub mesh_member_enabled: bool,
    /// Route `/modelmesh/<namespace>/` through the ODH gateway
    pub virtual_service_enabled: bool,
    /// Bound and backoff for read-merge-write conflict retries
    pub conflict_retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            mesh_member_enabled: false,
            virtual_service_enabled: true,
            conflict_retry: RetryConfig::conflict_default(),
        }
    }
}

/// Resolve the operator namespace: explicit value, then the mounted
/// service account namespace, then the default
pub fn resolve_operator_namespace(explicit: Option<String>) -> String {
    resolve_operator_namespace_from(explicit, Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE))
}

fn resolve_operator_namespace_from(explicit: Option<String>, namespace_file: &Path) -> String {
    if let Some(ns) = explicit.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        return ns;
    }
    match std::fs::read_to_string(namespace_file) {
        Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
        _ => {
            tracing::debug!(
                file = %namespace_file.display(),
                default = DEFAULT_OPERATOR_NAMESPACE,
                "operator namespace not discoverable, using default"
            );
            DEFAULT_OPERATOR_NAMESPACE.to_string()
        }
    }
}
