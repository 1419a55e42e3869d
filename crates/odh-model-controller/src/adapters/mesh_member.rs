//! ServiceMeshMember enrolling the parent's namespace in the ODH mesh

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;

use odh_common::crd::{ControlPlaneRef, InferenceService, ServiceMeshMember, ServiceMeshMemberSpec};
use odh_common::Result;

use super::{owner_ref, parent_namespace};
use crate::engine::{ChildAdapter, Desired};
use crate::store::ObjectStore;

/// Maistra only honours a member with this name
pub const MESH_MEMBER_NAME: &str = "default";
/// ServiceMeshControlPlane name
pub const CONTROL_PLANE_NAME: &str = "odh";
/// ServiceMeshControlPlane namespace
pub const CONTROL_PLANE_NAMESPACE: &str = "istio-system";

/// ServiceMeshMember adapter
///
/// The member is per namespace, not per InferenceService, so it carries no
/// parent label; only the control plane reference is owned.
pub struct MeshMemberAdapter;

#[async_trait]
impl ChildAdapter for MeshMemberAdapter {
    type Parent = InferenceService;
    type Child = ServiceMeshMember;
    type Inputs = ();

    fn name(&self) -> &'static str {
        "ServiceMeshMember"
    }

    async fn inputs(&self, _store: &dyn ObjectStore, _parent: &InferenceService) -> Result<()> {
        Ok(())
    }

    fn desired(&self, isvc: &InferenceService, _inputs: ()) -> Result<Desired<ServiceMeshMember>> {
        Ok(Desired::required(ServiceMeshMember {
            metadata: ObjectMeta {
                name: Some(MESH_MEMBER_NAME.to_string()),
                namespace: Some(parent_namespace(isvc)?),
                ..Default::default()
            },
            spec: ServiceMeshMemberSpec {
                control_plane_ref: ControlPlaneRef {
                    name: CONTROL_PLANE_NAME.to_string(),
                    namespace: CONTROL_PLANE_NAMESPACE.to_string(),
                },
                extra: Default::default(),
            },
        }))
    }

    fn matches(&self, desired: &ServiceMeshMember, observed: &ServiceMeshMember) -> bool {
        desired.spec.control_plane_ref == observed.spec.control_plane_ref
    }

    fn merge(&self, desired: &ServiceMeshMember, latest: &mut ServiceMeshMember) {
        latest.spec.control_plane_ref = desired.spec.control_plane_ref.clone();
    }

    fn owner(&self, isvc: &InferenceService) -> Option<OwnerReference> {
        owner_ref(isvc)
    }
}
