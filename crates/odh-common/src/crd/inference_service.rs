//! InferenceService (serving.kserve.io/v1beta1)
//!
//! The parent resource. The controller only reads it: the predictor's model
//! block names the ServingRuntime whose annotations drive Route policy.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ExtraFields;

/// Spec for an InferenceService
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "serving.kserve.io",
    version = "v1beta1",
    kind = "InferenceService",
    plural = "inferenceservices",
    shortname = "isvc",
    namespaced,
    status = "InferenceServiceStatus",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceSpec {
    /// Predictor component
    #[serde(default)]
    pub predictor: PredictorSpec,

    /// Transformer, explainer and anything else the controller does not read
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Predictor of an InferenceService
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictorSpec {
    /// Model to serve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSpec>,

    /// Fields the controller does not read
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Model served by a predictor
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Model format (e.g. onnx, openvino_ir)
    #[serde(default)]
    pub model_format: ModelFormat,

    /// Name of the ServingRuntime in the same namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Direct storage URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,

    /// Storage resolved through the namespace's storage-config secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,

    /// Fields the controller does not read
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Model format name and optional version
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelFormat {
    /// Format name
    pub name: String,
    /// Format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Reference into the storage-config secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Entry key in the storage-config secret (the data connection name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Path of the model inside the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Overrides for the storage entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<std::collections::BTreeMap<String, String>>,
}

/// Status of an InferenceService (written by KServe, read-only here)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceStatus {
    /// Inference endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Readiness conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<InferenceServiceCondition>,
}

/// Knative-style condition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceCondition {
    /// Condition type (e.g. "Ready")
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Last transition time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl InferenceService {
    /// Name of the ServingRuntime the predictor's model references, if any
    pub fn runtime_name(&self) -> Option<&str> {
        self.spec
            .predictor
            .model
            .as_ref()
            .and_then(|m| m.runtime.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// True when KServe reports the Ready condition as "True"
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| {
                s.conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISVC_YAML: &str = r#"
apiVersion: serving.kserve.io/v1beta1
kind: InferenceService
metadata:
  name: example-onnx-mnist
  namespace: models
  annotations:
    serving.kserve.io/deploymentMode: ModelMesh
spec:
  predictor:
    model:
      modelFormat:
        name: onnx
      runtime: ovms-1.x
      storage:
        key: localMinIO
        path: onnx/mnist.onnx
    minReplicas: 1
status:
  url: grpc://modelmesh-serving.models:8033
  conditions:
    - type: Ready
      status: "True"
"#;

    #[test]
    fn test_parses_modelmesh_inference_service() {
        let isvc: InferenceService = serde_yaml::from_str(ISVC_YAML).unwrap();
        assert_eq!(isvc.runtime_name(), Some("ovms-1.x"));
        assert!(isvc.is_ready());

        let model = isvc.spec.predictor.model.clone().unwrap();
        assert_eq!(model.model_format.name, "onnx");
        assert_eq!(model.storage.unwrap().key.as_deref(), Some("localMinIO"));
        assert!(isvc.spec.predictor.extra.contains_key("minReplicas"));
    }

    #[test]
    fn test_empty_runtime_is_treated_as_absent() {
        let mut isvc: InferenceService = serde_yaml::from_str(ISVC_YAML).unwrap();
        if let Some(model) = isvc.spec.predictor.model.as_mut() {
            model.runtime = Some(String::new());
        }
        assert_eq!(isvc.runtime_name(), None);
    }
}
