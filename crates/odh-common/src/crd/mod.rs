//! Typed resource definitions
//!
//! The controller does not install any of these CRDs; they are owned by
//! KServe, OpenShift, Istio and Maistra. The types model the fields the
//! controller reads or writes and carry everything else through a flattened
//! map so a read-merge-write cycle never drops another actor's fields.

mod inference_service;
mod route;
mod service_mesh_member;
mod serving_runtime;
mod virtual_service;

pub use inference_service::{
    InferenceService, InferenceServiceCondition, InferenceServiceSpec, InferenceServiceStatus,
    ModelFormat, ModelSpec, PredictorSpec, StorageSpec,
};
pub use route::{
    Route, RoutePort, RouteSpec, RouteTargetReference, RouteTls, TargetPort,
    INSECURE_EDGE_REDIRECT, TLS_TERMINATION_EDGE, TLS_TERMINATION_REENCRYPT, WILDCARD_POLICY_NONE,
};
pub use service_mesh_member::{ControlPlaneRef, ServiceMeshMember, ServiceMeshMemberSpec};
pub use serving_runtime::{ServingRuntime, ServingRuntimeSpec, SupportedModelFormat};
pub use virtual_service::{
    Destination, HttpMatchRequest, HttpRewrite, HttpRoute, HttpRouteDestination, PortSelector,
    StringMatch, VirtualService, VirtualServiceSpec,
};

/// Unrecognised fields of a foreign resource, preserved verbatim
pub type ExtraFields = std::collections::BTreeMap<String, serde_json::Value>;
