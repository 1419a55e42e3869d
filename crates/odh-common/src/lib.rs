//! Common types for the ODH model controller: resources, errors, and utilities
//!
//! - [`crd`] - Typed InferenceService, ServingRuntime, Route, VirtualService and ServiceMeshMember
//! - [`error`] - Error taxonomy shared by the store, engine and controllers
//! - [`retry`] - Bounded retry combinators (conflict retry for read-merge-write cycles)
//! - [`events`] - Kubernetes Event publishing
//! - [`kube_utils`] - Label and ownership helpers
//! - [`telemetry`] - Tracing subscriber setup

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the controller falls back to when it cannot discover its own
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "odh-model-controller-system";

/// Label linking a child resource back to the InferenceService it serves
pub const INFERENCE_SERVICE_NAME_LABEL: &str = "inferenceservice-name";

/// Label marking Open Data Hub managed objects
pub const ODH_MANAGED_LABEL: &str = "opendatahub.io/managed";

/// Label marking objects created through the Open Data Hub dashboard
pub const ODH_DASHBOARD_LABEL: &str = "opendatahub.io/dashboard";

/// Annotation carrying the storage type of a data connection secret
pub const CONNECTION_TYPE_ANNOTATION: &str = "opendatahub.io/connection-type";

/// ServingRuntime annotation enabling the authenticated (oauth proxy) port
pub const ENABLE_AUTH_ANNOTATION: &str = "enable-auth";

/// ServingRuntime annotation opting the runtime's models into external Routes
pub const CREATE_ROUTE_ANNOTATION: &str = "create-route";

/// Annotation value that switches a ServingRuntime feature on
pub const ANNOTATION_ENABLED: &str = "True";
