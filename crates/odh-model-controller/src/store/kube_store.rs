//! ObjectStore backed by the Kubernetes API

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use tracing::trace;

use odh_common::kube_utils::{namespaced_name, selector_string};
use odh_common::{Error, Result};

use super::{ObjectKey, ObjectStore};

/// ObjectStore talking to the API server through a shared [`Client`]
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, ar),
            None => Api::all_with(self.client.clone(), ar),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, ar: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        trace!(kind = %ar.kind, name = %key, "get");
        self.api(ar, key.namespace.as_deref())
            .get_opt(&key.name)
            .await
            .map_err(|e| Error::from_kube(&ar.kind, key.to_string(), e))
    }

    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector_string(selector));
        }
        trace!(kind = %ar.kind, namespace = ?namespace, selector = ?params.label_selector, "list");
        let list = self
            .api(ar, namespace)
            .list(&params)
            .await
            .map_err(|e| Error::from_kube(&ar.kind, namespace.unwrap_or("*"), e))?;
        Ok(list.items)
    }

    async fn create(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject> {
        let name = obj.name_any();
        let namespace = obj.namespace();
        trace!(kind = %ar.kind, name = %name, "create");
        self.api(ar, namespace.as_deref())
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| Error::from_kube(&ar.kind, namespaced_name(namespace.as_deref(), &name), e))
    }

    async fn update(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject> {
        let name = obj.name_any();
        let namespace = obj.namespace();
        trace!(
            kind = %ar.kind,
            name = %name,
            resource_version = ?obj.resource_version(),
            "replace"
        );
        self.api(ar, namespace.as_deref())
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| Error::from_kube(&ar.kind, namespaced_name(namespace.as_deref(), &name), e))
    }

    async fn delete(&self, ar: &ApiResource, key: &ObjectKey) -> Result<()> {
        trace!(kind = %ar.kind, name = %key, "delete");
        match self
            .api(ar, key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match Error::from_kube(&ar.kind, key.to_string(), e) {
                Error::NotFound { .. } => Ok(()),
                other => Err(other),
            },
        }
    }
}
