//! OpenShift Route (route.openshift.io/v1)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ExtraFields;

/// TLS termination at the router, re-encrypting to the backend
pub const TLS_TERMINATION_REENCRYPT: &str = "reencrypt";
/// TLS termination at the router, plain HTTP to the backend
pub const TLS_TERMINATION_EDGE: &str = "edge";
/// Redirect plain HTTP requests to HTTPS
pub const INSECURE_EDGE_REDIRECT: &str = "Redirect";
/// No wildcard host matching
pub const WILDCARD_POLICY_NONE: &str = "None";

/// Spec for a Route
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    plural = "routes",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Hostname, assigned by the router when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Path prefix the router matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Backend the route points at
    pub to: RouteTargetReference,

    /// Target port on the backend Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTls>,

    /// Wildcard policy ("None" or "Subdomain")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_policy: Option<String>,

    /// Fields owned by the router or by admins
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Backend reference of a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// Backend kind (always "Service")
    pub kind: String,
    /// Backend name
    pub name: String,
    /// Relative weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// Port selector of a Route
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port number or name on the backend Service
    pub target_port: TargetPort,
}

/// An IntOrString port reference
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum TargetPort {
    /// Numeric port
    Number(i32),
    /// Named port
    Name(String),
}

/// TLS settings of a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTls {
    /// Termination type ("edge", "passthrough" or "reencrypt")
    pub termination: String,
    /// What to do with plain HTTP traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
    /// Certificates and anything else configured out of band
    #[serde(flatten)]
    pub extra: ExtraFields,
}
