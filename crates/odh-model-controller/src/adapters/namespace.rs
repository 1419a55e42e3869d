//! Namespace labels
//!
//! ModelMesh only deploys runtimes into namespaces labelled
//! `modelmesh-enabled=true`, and the mesh only injects sidecars where
//! `istio-injection=enabled`. The namespace itself belongs to the user, so
//! the adapter repairs those two labels and nothing else.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;

use odh_common::crd::InferenceService;
use odh_common::kube_utils::{labels, labels_match, merge_labels};
use odh_common::Result;

use super::parent_namespace;
use crate::engine::{ChildAdapter, Desired};
use crate::store::ObjectStore;

/// Label enabling ModelMesh in a namespace
pub const MODELMESH_ENABLED_LABEL: &str = "modelmesh-enabled";
/// Label enabling sidecar injection in a namespace
pub const ISTIO_INJECTION_LABEL: &str = "istio-injection";

/// Keeps the parent's namespace labelled for ModelMesh and the mesh
pub struct NamespaceAdapter;

#[async_trait]
impl ChildAdapter for NamespaceAdapter {
    type Parent = InferenceService;
    type Child = Namespace;
    type Inputs = ();

    fn name(&self) -> &'static str {
        "Namespace"
    }

    async fn inputs(&self, _store: &dyn ObjectStore, _parent: &InferenceService) -> Result<()> {
        Ok(())
    }

    fn desired(&self, isvc: &InferenceService, _inputs: ()) -> Result<Desired<Namespace>> {
        Ok(Desired::repair_only(Namespace {
            metadata: ObjectMeta {
                name: Some(parent_namespace(isvc)?),
                labels: Some(labels([
                    (MODELMESH_ENABLED_LABEL, "true"),
                    (ISTIO_INJECTION_LABEL, "enabled"),
                ])),
                ..Default::default()
            },
            ..Default::default()
        }))
    }

    fn matches(&self, desired: &Namespace, observed: &Namespace) -> bool {
        labels_match(
            desired.metadata.labels.as_ref().unwrap_or(&Default::default()),
            observed.metadata.labels.as_ref(),
        )
    }

    fn merge(&self, desired: &Namespace, latest: &mut Namespace) {
        if let Some(owned) = desired.metadata.labels.as_ref() {
            merge_labels(owned, &mut latest.metadata.labels);
        }
    }
}
