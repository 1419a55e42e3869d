//! External Route for an InferenceService
//!
//! Exposes `/v2/models/<name>` through the OpenShift router. Whether the
//! route exists, and how it terminates TLS, is decided by two annotations
//! on the ServingRuntime the model references:
//!
//! | `create-route` | `enable-auth` | result                         |
//! |----------------|---------------|--------------------------------|
//! | `"True"`       | `"True"`      | port 8443, reencrypt           |
//! | `"True"`       | other         | port 8008, edge                |
//! | other          | any           | no route (deleted if present)  |
//!
//! `spec.host` is assigned by the router and never compared or overwritten.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::warn;

use odh_common::crd::{
    InferenceService, Route, RoutePort, RouteSpec, RouteTargetReference, RouteTls, ServingRuntime,
    TargetPort, INSECURE_EDGE_REDIRECT, TLS_TERMINATION_EDGE, TLS_TERMINATION_REENCRYPT,
    WILDCARD_POLICY_NONE,
};
use odh_common::kube_utils::{labels_match, merge_labels};
use odh_common::Result;

use super::{owner_ref, parent_labels, parent_namespace, MODELMESH_SERVICE};
use crate::engine::{ChildAdapter, Desired};
use crate::store::{get_typed, ObjectKey, ObjectStore};

/// ModelMesh REST port behind the oauth proxy
pub const MODELMESH_AUTH_PORT: i32 = 8443;
/// ModelMesh plain REST port
pub const MODELMESH_PORT: i32 = 8008;

/// Route policy read from the referenced ServingRuntime
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Serve through the authenticated port
    pub enable_auth: bool,
    /// Expose the model at all
    pub create_route: bool,
}

/// Route adapter
pub struct RouteAdapter;

#[async_trait]
impl ChildAdapter for RouteAdapter {
    type Parent = InferenceService;
    type Child = Route;
    type Inputs = RoutePolicy;

    fn name(&self) -> &'static str {
        "Route"
    }

    async fn inputs(&self, store: &dyn ObjectStore, isvc: &InferenceService) -> Result<RoutePolicy> {
        let Some(runtime_name) = isvc.runtime_name() else {
            warn!(
                inference_service = %isvc.name_any(),
                "no serving runtime referenced, using default route policy"
            );
            return Ok(RoutePolicy::default());
        };

        let key = ObjectKey::namespaced(parent_namespace(isvc)?, runtime_name);
        match get_typed::<ServingRuntime>(store, &key).await? {
            Some(runtime) => Ok(RoutePolicy {
                enable_auth: runtime.auth_enabled(),
                create_route: runtime.route_enabled(),
            }),
            None => {
                warn!(
                    inference_service = %isvc.name_any(),
                    serving_runtime = %key,
                    "serving runtime not found, using default route policy"
                );
                Ok(RoutePolicy::default())
            }
        }
    }

    fn desired(&self, isvc: &InferenceService, policy: RoutePolicy) -> Result<Desired<Route>> {
        let name = isvc.name_any();
        let (port, termination) = if policy.enable_auth {
            (MODELMESH_AUTH_PORT, TLS_TERMINATION_REENCRYPT)
        } else {
            (MODELMESH_PORT, TLS_TERMINATION_EDGE)
        };

        let route = Route {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(parent_namespace(isvc)?),
                labels: Some(parent_labels(isvc)),
                ..Default::default()
            },
            spec: RouteSpec {
                host: None,
                path: Some(format!("/v2/models/{name}")),
                to: RouteTargetReference {
                    kind: "Service".to_string(),
                    name: MODELMESH_SERVICE.to_string(),
                    weight: Some(100),
                },
                port: Some(RoutePort {
                    target_port: TargetPort::Number(port),
                }),
                tls: Some(RouteTls {
                    termination: termination.to_string(),
                    insecure_edge_termination_policy: Some(INSECURE_EDGE_REDIRECT.to_string()),
                    ..Default::default()
                }),
                wildcard_policy: Some(WILDCARD_POLICY_NONE.to_string()),
                extra: Default::default(),
            },
        };

        Ok(if policy.create_route {
            Desired::required(route)
        } else {
            Desired::absent(route)
        })
    }

    fn matches(&self, desired: &Route, observed: &Route) -> bool {
        let (d, o) = (&desired.spec, &observed.spec);
        labels_match(
            desired.metadata.labels.as_ref().unwrap_or(&Default::default()),
            observed.metadata.labels.as_ref(),
        ) && d.path == o.path
            && d.to == o.to
            && d.port == o.port
            && d.wildcard_policy == o.wildcard_policy
            && tls_matches(d.tls.as_ref(), o.tls.as_ref())
    }

    fn merge(&self, desired: &Route, latest: &mut Route) {
        if let Some(owned) = desired.metadata.labels.as_ref() {
            merge_labels(owned, &mut latest.metadata.labels);
        }
        let (d, l) = (&desired.spec, &mut latest.spec);
        l.path = d.path.clone();
        l.to = d.to.clone();
        l.port = d.port.clone();
        l.wildcard_policy = d.wildcard_policy.clone();
        match (&d.tls, &mut l.tls) {
            (Some(want), Some(have)) => {
                have.termination = want.termination.clone();
                have.insecure_edge_termination_policy = want.insecure_edge_termination_policy.clone();
            }
            (want, have) => *have = want.clone(),
        }
    }

    fn owner(&self, isvc: &InferenceService) -> Option<OwnerReference> {
        owner_ref(isvc)
    }
}

/// Termination mode and HTTP policy; certificates are managed elsewhere
fn tls_matches(desired: Option<&RouteTls>, observed: Option<&RouteTls>) -> bool {
    match (desired, observed) {
        (Some(d), Some(o)) => {
            d.termination == o.termination
                && d.insecure_edge_termination_policy == o.insecure_edge_termination_policy
        }
        (None, None) => true,
        _ => false,
    }
}
