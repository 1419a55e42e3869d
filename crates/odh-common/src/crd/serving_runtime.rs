//! ServingRuntime (serving.kserve.io/v1alpha1)
//!
//! Runtimes are shared by every InferenceService in a namespace, so the
//! controller never owns or rewrites them. It reads two annotations for Route
//! policy and seeds missing runtimes from the operator's runtime catalogue.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ExtraFields;
use crate::{ANNOTATION_ENABLED, CREATE_ROUTE_ANNOTATION, ENABLE_AUTH_ANNOTATION};

/// Spec for a ServingRuntime
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "serving.kserve.io",
    version = "v1alpha1",
    kind = "ServingRuntime",
    plural = "servingruntimes",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServingRuntimeSpec {
    /// Model formats the runtime can load
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_model_formats: Vec<SupportedModelFormat>,

    /// Whether the runtime is a ModelMesh multi-model runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_model: Option<bool>,

    /// Containers, built-in adapter and everything else, carried verbatim
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A model format supported by a runtime
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedModelFormat {
    /// Format name
    pub name: String,
    /// Format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether the runtime is picked automatically for this format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_select: Option<bool>,
}

impl ServingRuntime {
    /// True when the `enable-auth` annotation is exactly "True"
    pub fn auth_enabled(&self) -> bool {
        annotation_enabled(self, ENABLE_AUTH_ANNOTATION)
    }

    /// True when the `create-route` annotation is exactly "True"
    pub fn route_enabled(&self) -> bool {
        annotation_enabled(self, CREATE_ROUTE_ANNOTATION)
    }
}

fn annotation_enabled(runtime: &ServingRuntime, key: &str) -> bool {
    runtime
        .annotations()
        .get(key)
        .is_some_and(|v| v == ANNOTATION_ENABLED)
}
