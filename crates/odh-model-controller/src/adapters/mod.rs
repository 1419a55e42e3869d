//! Resource adapters
//!
//! Each adapter describes one child kind to the [`ReconcileEngine`]: what it
//! should look like, which of its fields the controller owns, and whether it
//! should exist at all. None of them perform writes themselves.
//!
//! [`ReconcileEngine`]: crate::engine::ReconcileEngine

mod mesh_member;
mod namespace;
mod route;
mod service_account;
mod serving_runtimes;
mod storage_config;
mod virtual_service;

pub use mesh_member::{MeshMemberAdapter, CONTROL_PLANE_NAME, CONTROL_PLANE_NAMESPACE, MESH_MEMBER_NAME};
pub use namespace::{NamespaceAdapter, ISTIO_INJECTION_LABEL, MODELMESH_ENABLED_LABEL};
pub use route::{RouteAdapter, RoutePolicy, MODELMESH_AUTH_PORT, MODELMESH_PORT};
pub use service_account::{
    auth_delegator_binding_name, ClusterRoleBindingAdapter, ServiceAccountAdapter,
    AUTH_DELEGATOR_CLUSTER_ROLE, MODELMESH_SERVICE_ACCOUNT,
};
pub use serving_runtimes::{
    decode_catalogue, ServingRuntimeSetAdapter, RUNTIMES_CONFIG_KEY, RUNTIMES_CONFIG_MAP,
};
pub use storage_config::{data_connection_selector, StorageConfigAdapter, STORAGE_CONFIG_SECRET};
pub use virtual_service::{VirtualServiceAdapter, ODH_GATEWAY};

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use odh_common::crd::InferenceService;
use odh_common::{Error, Result, INFERENCE_SERVICE_NAME_LABEL};

/// Service fronting every ModelMesh runtime pod in a namespace
pub const MODELMESH_SERVICE: &str = "modelmesh-serving";

/// Namespace of an InferenceService, which every child is derived from
pub(crate) fn parent_namespace(isvc: &InferenceService) -> Result<String> {
    isvc.namespace().ok_or_else(|| {
        Error::validation(isvc.name_any(), "InferenceService has no namespace")
    })
}

/// Controller reference pointing at the InferenceService
pub(crate) fn owner_ref(isvc: &InferenceService) -> Option<OwnerReference> {
    isvc.controller_owner_ref(&())
}

/// `inferenceservice-name=<name>`
pub(crate) fn parent_labels(isvc: &InferenceService) -> BTreeMap<String, String> {
    BTreeMap::from([(INFERENCE_SERVICE_NAME_LABEL.to_string(), isvc.name_any())])
}

#[cfg(test)]
pub(crate) mod fixtures {
    use kube::api::ObjectMeta;
    use odh_common::crd::{InferenceService, InferenceServiceSpec, ModelFormat, ModelSpec, PredictorSpec};

    /// An InferenceService as the API server would return it
    pub fn inference_service(namespace: &str, name: &str, runtime: Option<&str>) -> InferenceService {
        InferenceService {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some(format!("uid-{namespace}-{name}")),
                ..Default::default()
            },
            spec: InferenceServiceSpec {
                predictor: PredictorSpec {
                    model: Some(ModelSpec {
                        model_format: ModelFormat {
                            name: "onnx".to_string(),
                            version: None,
                        },
                        runtime: runtime.map(str::to_string),
                        storage_uri: Some("s3://models/mnist".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
            status: None,
        }
    }
}
