//! ModelMesh service account and its auth-delegator binding
//!
//! The oauth proxy in front of ModelMesh runs as `modelmesh-serving-sa` and
//! needs `system:auth-delegator` to validate bearer tokens. Two adapters,
//! reconciled independently: the account only has to exist, the binding's
//! role reference and subjects are the only fields the controller owns.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;

use odh_common::crd::InferenceService;
use odh_common::Result;

use super::{owner_ref, parent_namespace};
use crate::engine::{ChildAdapter, Desired};
use crate::store::ObjectStore;

/// Service account the ModelMesh pods run as
pub const MODELMESH_SERVICE_ACCOUNT: &str = "modelmesh-serving-sa";
/// Cluster role allowing token and subject access reviews
pub const AUTH_DELEGATOR_CLUSTER_ROLE: &str = "system:auth-delegator";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Cluster-wide name of the auth-delegator binding for a namespace
///
/// Deliberately not the single shared `modelmesh-serving-sa-auth-delegator`
/// binding: bindings are cluster-scoped, and one shared name would leave
/// every namespace overwriting the others' subjects. Qualifying the name with
/// the namespace gives each namespace its own binding.
pub fn auth_delegator_binding_name(namespace: &str) -> String {
    format!("{namespace}-{MODELMESH_SERVICE_ACCOUNT}-auth-delegator")
}

// =============================================================================
// ServiceAccount
// =============================================================================

/// Ensures `modelmesh-serving-sa` exists in the parent's namespace
pub struct ServiceAccountAdapter;

#[async_trait]
impl ChildAdapter for ServiceAccountAdapter {
    type Parent = InferenceService;
    type Child = ServiceAccount;
    type Inputs = ();

    fn name(&self) -> &'static str {
        "ServiceAccount"
    }

    async fn inputs(&self, _store: &dyn ObjectStore, _parent: &InferenceService) -> Result<()> {
        Ok(())
    }

    fn desired(&self, isvc: &InferenceService, _inputs: ()) -> Result<Desired<ServiceAccount>> {
        Ok(Desired::required(ServiceAccount {
            metadata: ObjectMeta {
                name: Some(MODELMESH_SERVICE_ACCOUNT.to_string()),
                namespace: Some(parent_namespace(isvc)?),
                ..Default::default()
            },
            ..Default::default()
        }))
    }

    // Existence only: secrets and image pull secrets are filled in by the platform
    fn matches(&self, _desired: &ServiceAccount, _observed: &ServiceAccount) -> bool {
        true
    }

    fn merge(&self, _desired: &ServiceAccount, _latest: &mut ServiceAccount) {}

    fn owner(&self, isvc: &InferenceService) -> Option<OwnerReference> {
        owner_ref(isvc)
    }
}

// =============================================================================
// ClusterRoleBinding
// =============================================================================

/// Binds `system:auth-delegator` to the namespace's ModelMesh service account
pub struct ClusterRoleBindingAdapter;

#[async_trait]
impl ChildAdapter for ClusterRoleBindingAdapter {
    type Parent = InferenceService;
    type Child = ClusterRoleBinding;
    type Inputs = ();

    fn name(&self) -> &'static str {
        "ClusterRoleBinding"
    }

    async fn inputs(&self, _store: &dyn ObjectStore, _parent: &InferenceService) -> Result<()> {
        Ok(())
    }

    fn desired(&self, isvc: &InferenceService, _inputs: ()) -> Result<Desired<ClusterRoleBinding>> {
        let namespace = parent_namespace(isvc)?;
        Ok(Desired::required(ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(auth_delegator_binding_name(&namespace)),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "ClusterRole".to_string(),
                name: AUTH_DELEGATOR_CLUSTER_ROLE.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: MODELMESH_SERVICE_ACCOUNT.to_string(),
                namespace: Some(namespace),
                api_group: None,
            }]),
        }))
    }

    fn matches(&self, desired: &ClusterRoleBinding, observed: &ClusterRoleBinding) -> bool {
        desired.role_ref == observed.role_ref && desired.subjects == observed.subjects
    }

    fn merge(&self, desired: &ClusterRoleBinding, latest: &mut ClusterRoleBinding) {
        latest.role_ref = desired.role_ref.clone();
        latest.subjects = desired.subjects.clone();
    }

    fn owner(&self, isvc: &InferenceService) -> Option<OwnerReference> {
        owner_ref(isvc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fixtures::inference_service;

    #[test]
    fn test_binding_name_is_namespace_qualified() {
        assert_eq!(
            auth_delegator_binding_name("models"),
            "models-modelmesh-serving-sa-auth-delegator"
        );
    }

    #[test]
    fn test_binding_targets_the_namespace_service_account() {
        let isvc = inference_service("models", "mnist", None);
        let crb = ClusterRoleBindingAdapter.desired(&isvc, ()).unwrap().object;

        assert!(crb.metadata.namespace.is_none());
        assert_eq!(crb.role_ref.name, "system:auth-delegator");
        let subject = &crb.subjects.as_ref().unwrap()[0];
        assert_eq!(subject.name, "modelmesh-serving-sa");
        assert_eq!(subject.namespace.as_deref(), Some("models"));
    }

    #[test]
    fn test_binding_comparator_ignores_metadata() {
        let isvc = inference_service("models", "mnist", None);
        let desired = ClusterRoleBindingAdapter.desired(&isvc, ()).unwrap().object;

        let mut observed = desired.clone();
        observed.metadata.labels = Some([("audit".to_string(), "yes".to_string())].into());
        assert!(ClusterRoleBindingAdapter.matches(&desired, &observed));

        observed.subjects.as_mut().unwrap().push(Subject {
            kind: "User".to_string(),
            name: "mallory".to_string(),
            ..Default::default()
        });
        assert!(!ClusterRoleBindingAdapter.matches(&desired, &observed));

        ClusterRoleBindingAdapter.merge(&desired, &mut observed);
        assert!(ClusterRoleBindingAdapter.matches(&desired, &observed));
        assert!(observed.metadata.labels.is_some());
    }

    #[test]
    fn test_service_account_is_existence_only() {
        let isvc = inference_service("models", "mnist", None);
        let desired = ServiceAccountAdapter.desired(&isvc, ()).unwrap().object;
        let mut observed = desired.clone();
        observed.automount_service_account_token = Some(false);
        assert!(ServiceAccountAdapter.matches(&desired, &observed));
    }
}
