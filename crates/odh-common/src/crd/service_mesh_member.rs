//! Maistra ServiceMeshMember (maistra.io/v1)
//!
//! Enrolls a namespace in a ServiceMeshControlPlane. Maistra only honours a
//! member named `default`, so there is one per namespace.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ExtraFields;

/// Spec for a ServiceMeshMember
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "maistra.io",
    version = "v1",
    kind = "ServiceMeshMember",
    plural = "servicemeshmembers",
    shortname = "smm",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshMemberSpec {
    /// Control plane to join
    pub control_plane_ref: ControlPlaneRef,

    /// Fields the controller does not manage
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Reference to a ServiceMeshControlPlane
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneRef {
    /// Control plane name
    pub name: String,
    /// Control plane namespace
    pub namespace: String,
}
