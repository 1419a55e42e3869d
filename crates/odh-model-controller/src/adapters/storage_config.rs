//! `storage-config` aggregation secret
//!
//! ModelMesh pullers read S3 credentials from a single `storage-config`
//! secret per namespace. The dashboard instead creates one "data connection"
//! secret per bucket, labelled `opendatahub.io/managed=true` and
//! `opendatahub.io/dashboard=true`, with `AWS_*` keys. This adapter folds
//! every data connection into one JSON entry of `storage-config`, keyed by
//! the data connection's name:
//!
//! ```text
//! AWS_ACCESS_KEY_ID      -> access_key_id
//! AWS_S3_BUCKET          -> default_bucket
//! AWS_S3_ENDPOINT        -> endpoint_url
//! AWS_DEFAULT_REGION     -> region
//! AWS_SECRET_ACCESS_KEY  -> secret_access_key
//! opendatahub.io/connection-type annotation -> type
//! ```
//!
//! The secret is a function of the namespace, not of any one
//! InferenceService, so it carries no owner reference and its data is
//! replaced wholesale on drift.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use serde::Serialize;

use odh_common::kube_utils::{labels, labels_match, merge_labels};
use odh_common::{Error, Result, CONNECTION_TYPE_ANNOTATION, ODH_DASHBOARD_LABEL, ODH_MANAGED_LABEL};

use crate::engine::{ChildAdapter, Desired};
use crate::store::{list_typed, ObjectStore};

/// Name of the aggregated secret
pub const STORAGE_CONFIG_SECRET: &str = "storage-config";

/// Labels selecting dashboard data connections
pub fn data_connection_selector() -> BTreeMap<String, String> {
    labels([(ODH_MANAGED_LABEL, "true"), (ODH_DASHBOARD_LABEL, "true")])
}

/// One storage entry; fields serialize in key order
#[derive(Debug, Serialize)]
struct StorageEntry {
    access_key_id: String,
    default_bucket: String,
    endpoint_url: String,
    region: String,
    secret_access_key: String,
    #[serde(rename = "type")]
    type_: String,
}

impl StorageEntry {
    fn from_data_connection(secret: &Secret) -> Self {
        let field = |key: &str| {
            secret
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|v| String::from_utf8_lossy(&v.0).into_owned())
                .unwrap_or_default()
        };
        Self {
            access_key_id: field("AWS_ACCESS_KEY_ID"),
            default_bucket: field("AWS_S3_BUCKET"),
            endpoint_url: field("AWS_S3_ENDPOINT"),
            region: field("AWS_DEFAULT_REGION"),
            secret_access_key: field("AWS_SECRET_ACCESS_KEY"),
            type_: secret
                .annotations()
                .get(CONNECTION_TYPE_ANNOTATION)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Aggregates the data connections of one namespace; the parent is the namespace name
pub struct StorageConfigAdapter;

#[async_trait]
impl ChildAdapter for StorageConfigAdapter {
    type Parent = String;
    type Child = Secret;
    type Inputs = Vec<Secret>;

    fn name(&self) -> &'static str {
        "StorageConfig"
    }

    async fn inputs(&self, store: &dyn ObjectStore, namespace: &String) -> Result<Vec<Secret>> {
        list_typed::<Secret>(store, Some(namespace), &data_connection_selector()).await
    }

    fn desired(&self, namespace: &String, connections: Vec<Secret>) -> Result<Desired<Secret>> {
        let mut data = BTreeMap::new();
        for secret in &connections {
            let entry = StorageEntry::from_data_connection(secret);
            let json = serde_json::to_vec(&entry)
                .map_err(|e| Error::serialization_for_kind("Secret", e.to_string()))?;
            data.insert(secret.name_any(), ByteString(json));
        }

        Ok(Desired::required(Secret {
            metadata: ObjectMeta {
                name: Some(STORAGE_CONFIG_SECRET.to_string()),
                namespace: Some(namespace.clone()),
                labels: Some(labels([(ODH_MANAGED_LABEL, "true")])),
                ..Default::default()
            },
            data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        }))
    }

    fn matches(&self, desired: &Secret, observed: &Secret) -> bool {
        labels_match(
            desired.metadata.labels.as_ref().unwrap_or(&Default::default()),
            observed.metadata.labels.as_ref(),
        ) && desired.data.clone().unwrap_or_default() == observed.data.clone().unwrap_or_default()
    }

    fn merge(&self, desired: &Secret, latest: &mut Secret) {
        if let Some(owned) = desired.metadata.labels.as_ref() {
            merge_labels(owned, &mut latest.metadata.labels);
        }
        latest.data = desired.data.clone();
        latest.string_data = None;
    }
}
