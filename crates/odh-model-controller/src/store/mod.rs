//! ObjectStore - the only way reconcile code touches the cluster
//!
//! The trait is deliberately small and untyped: every call takes an
//! [`ApiResource`] and moves [`DynamicObject`]s. Typed adapters convert with
//! [`to_dynamic`] / [`from_dynamic`], so one fake store serves every kind in
//! tests.
//!
//! Error contract (see [`odh_common::Error`]):
//! - `get` returns `Ok(None)` for a missing object
//! - `create` fails with `AlreadyExists` when the name is taken
//! - `update` fails with `Conflict` when the object's resourceVersion is stale
//!   and `NotFound` when the object is gone
//! - `delete` of a missing object succeeds

mod kube_store;
#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use kube::api::{DynamicObject, TypeMeta};
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use odh_common::{Error, Result};

pub use kube_store::KubeStore;

/// Identity of an object within its kind
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// Namespace, `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key for a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an existing resource value
    pub fn of<K: Resource>(obj: &K) -> Result<Self> {
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| Error::internal_with_context("store", "object has no name"))?;
        Ok(Self {
            namespace: obj.meta().namespace.clone(),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Cluster object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` when it does not exist
    async fn get(&self, ar: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    /// List objects of a kind, optionally within one namespace, matching every selector label
    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>>;

    /// Create a new object
    async fn create(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject>;

    /// Replace an object, guarded by its `metadata.resourceVersion`
    async fn update(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject>;

    /// Delete an object
    async fn delete(&self, ar: &ApiResource, key: &ObjectKey) -> Result<()>;
}

// =============================================================================
// Typed conversions
// =============================================================================

/// The ApiResource of a statically typed kind
pub fn api_resource<K: Resource<DynamicType = ()>>() -> ApiResource {
    ApiResource::erase::<K>(&())
}

/// Convert a typed resource into a DynamicObject carrying its apiVersion/kind
pub fn to_dynamic<K>(obj: &K) -> Result<DynamicObject>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let value = serde_json::to_value(obj)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    let mut dynamic: DynamicObject = serde_json::from_value(value)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    if dynamic.types.is_none() {
        dynamic.types = Some(TypeMeta {
            api_version: K::api_version(&()).to_string(),
            kind: K::kind(&()).to_string(),
        });
    }
    Ok(dynamic)
}

/// Convert a DynamicObject into a typed resource
pub fn from_dynamic<K>(obj: DynamicObject) -> Result<K>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let name = obj.name_any();
    let value = serde_json::to_value(obj)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    serde_json::from_value(value).map_err(|e| {
        Error::serialization_for_kind(K::kind(&()), format!("decoding {name}: {e}"))
    })
}

/// Typed `get`
pub async fn get_typed<K>(store: &dyn ObjectStore, key: &ObjectKey) -> Result<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .get(&api_resource::<K>(), key)
        .await?
        .map(from_dynamic)
        .transpose()
}

/// Typed `list`
pub async fn list_typed<K>(
    store: &dyn ObjectStore,
    namespace: Option<&str>,
    selector: &BTreeMap<String, String>,
) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .list(&api_resource::<K>(), namespace, selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}
