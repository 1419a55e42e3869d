//! In-memory ObjectStore for tests
//!
//! Behaves like the API server where the reconcile engine can tell the
//! difference: monotonically increasing resourceVersions, server-assigned
//! uids, 409s on stale writes and duplicate creates, and cascading deletes
//! through ownerReferences. On top of that it counts writes and lets a test
//! inject failures and concurrent writers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use odh_common::kube_utils::labels_match;
use odh_common::{Error, Result};

use super::{api_resource, from_dynamic, to_dynamic, ObjectKey, ObjectStore};

type Mutation = Box<dyn FnOnce(&mut DynamicObject) + Send>;

/// A recorded mutating call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Create { kind: String, key: ObjectKey },
    Update { kind: String, key: ObjectKey },
    Delete { kind: String, key: ObjectKey },
}

fn forbidden(kind: &str, name: &str) -> Error {
    Error::from_kube(
        kind,
        name,
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{kind} is forbidden: injected failure"),
            reason: "Forbidden".to_string(),
            code: 403,
        }),
    )
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, ObjectKey), DynamicObject>,
    next_version: u64,
    writes: Vec<Write>,
    failing_kinds: BTreeSet<String>,
    failing_objects: BTreeSet<(String, ObjectKey)>,
    pending_writers: Vec<(String, ObjectKey, Mutation)>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check_object(&self, kind: &str, key: &ObjectKey) -> Result<()> {
        if self.failing_objects.contains(&(kind.to_string(), key.clone())) {
            return Err(forbidden(kind, &key.to_string()));
        }
        self.check_failure(kind, &key.to_string())
    }

    fn check_failure(&self, kind: &str, name: &str) -> Result<()> {
        if self.failing_kinds.contains(kind) {
            return Err(forbidden(kind, name));
        }
        Ok(())
    }

    /// Apply a pending concurrent writer for this object, as if another actor won the race
    fn run_concurrent_writer(&mut self, kind: &str, key: &ObjectKey) {
        let Some(pos) = self
            .pending_writers
            .iter()
            .position(|(k, key2, _)| k == kind && key2 == key)
        else {
            return;
        };
        let (_, _, mutate) = self.pending_writers.remove(pos);
        let version = self.bump();
        if let Some(obj) = self.objects.get_mut(&(kind.to_string(), key.clone())) {
            mutate(obj);
            obj.metadata.resource_version = Some(version);
        }
    }

    /// Delete an object and every dependent reachable through ownerReferences
    ///
    /// Like the real garbage collector, a namespaced owner never collects a
    /// cluster-scoped dependent (OwnerRefInvalidNamespace); it is left behind.
    fn delete_cascading(&mut self, kind: &str, key: &ObjectKey) {
        let mut doomed: Vec<(String, bool)> = Vec::new();
        if let Some(obj) = self.objects.remove(&(kind.to_string(), key.clone())) {
            doomed.extend(obj.uid().map(|uid| (uid, key.namespace.is_some())));
        }
        while let Some((uid, owner_namespaced)) = doomed.pop() {
            let dependents: Vec<(String, ObjectKey)> = self
                .objects
                .iter()
                .filter(|((_, dep), _)| !(owner_namespaced && dep.namespace.is_none()))
                .filter(|(_, obj)| obj.owner_references().iter().any(|r| r.uid == uid))
                .map(|(k, _)| k.clone())
                .collect();
            for dep in dependents {
                if let Some(obj) = self.objects.remove(&dep) {
                    doomed.extend(obj.uid().map(|uid| (uid, dep.1.namespace.is_some())));
                }
            }
        }
    }
}

/// In-memory ObjectStore
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an object without recording a write
    pub fn seed<K>(&self, obj: &K) -> DynamicObject
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let mut dynamic = to_dynamic(obj).unwrap();
        let key = ObjectKey::of(&dynamic).unwrap();
        let mut state = self.lock();
        dynamic.metadata.resource_version = Some(state.bump());
        dynamic
            .metadata
            .uid
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        state
            .objects
            .insert((K::kind(&()).to_string(), key), dynamic.clone());
        dynamic
    }

    /// Typed read for assertions
    pub fn fetch<K>(&self, key: &ObjectKey) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let state = self.lock();
        state
            .objects
            .get(&(K::kind(&()).to_string(), key.clone()))
            .cloned()
            .map(|obj| from_dynamic(obj).unwrap())
    }

    /// Edit a stored object out of band (an admin with kubectl), bumping its version
    pub fn edit<K>(&self, key: &ObjectKey, f: impl FnOnce(&mut K))
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let mut typed: K = self.fetch(key).unwrap();
        f(&mut typed);
        let mut dynamic = to_dynamic(&typed).unwrap();
        let mut state = self.lock();
        dynamic.metadata.resource_version = Some(state.bump());
        state
            .objects
            .insert((K::kind(&()).to_string(), key.clone()), dynamic);
    }

    /// Make every call on `kind` fail with a 403
    pub fn fail_kind(&self, kind: &str) {
        self.lock().failing_kinds.insert(kind.to_string());
    }

    /// Make every call on one object fail with a 403
    pub fn fail_object(&self, kind: &str, key: ObjectKey) {
        self.lock().failing_objects.insert((kind.to_string(), key));
    }

    /// Stop failing calls on `kind`
    pub fn heal_kind(&self, kind: &str) {
        self.lock().failing_kinds.remove(kind);
    }

    /// Let another writer modify the object right before our next update lands
    ///
    /// The mutation bumps the resourceVersion, so the in-flight update carries
    /// a stale token and is rejected with a conflict.
    pub fn race_next_update(
        &self,
        kind: &str,
        key: ObjectKey,
        mutate: impl FnOnce(&mut DynamicObject) + Send + 'static,
    ) {
        self.lock()
            .pending_writers
            .push((kind.to_string(), key, Box::new(mutate)));
    }

    /// Delete an object as a user would, letting garbage collection cascade
    pub fn delete_with_gc<K>(&self, key: &ObjectKey)
    where
        K: Resource<DynamicType = ()>,
    {
        self.lock().delete_cascading(&K::kind(&()), key);
    }

    /// All mutating calls so far
    pub fn writes(&self) -> Vec<Write> {
        self.lock().writes.clone()
    }

    /// Number of mutating calls so far
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Forget recorded writes
    pub fn reset_writes(&self) {
        self.lock().writes.clear();
    }

    /// Number of stored objects of a kind
    pub fn count<K: Resource<DynamicType = ()>>(&self) -> usize {
        let kind = K::kind(&()).to_string();
        self.lock().objects.keys().filter(|(k, _)| *k == kind).count()
    }

    /// ApiResource helper for tests that talk to the trait directly
    pub fn ar<K: Resource<DynamicType = ()>>() -> ApiResource {
        api_resource::<K>()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, ar: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let state = self.lock();
        state.check_object(&ar.kind, key)?;
        Ok(state.objects.get(&(ar.kind.clone(), key.clone())).cloned())
    }

    async fn list(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>> {
        let state = self.lock();
        state.check_failure(&ar.kind, namespace.unwrap_or("*"))?;
        Ok(state
            .objects
            .iter()
            .filter(|((kind, key), _)| {
                *kind == ar.kind && namespace.map_or(true, |ns| key.namespace.as_deref() == Some(ns))
            })
            .filter(|(_, obj)| labels_match(selector, obj.metadata.labels.as_ref()))
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(obj)?;
        let mut state = self.lock();
        state.check_object(&ar.kind, &key)?;
        let map_key = (ar.kind.clone(), key.clone());
        if state.objects.contains_key(&map_key) {
            return Err(Error::already_exists(&ar.kind, key.to_string()));
        }
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(state.bump());
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        state.objects.insert(map_key, stored.clone());
        state.writes.push(Write::Create {
            kind: ar.kind.clone(),
            key,
        });
        Ok(stored)
    }

    async fn update(&self, ar: &ApiResource, obj: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(obj)?;
        let mut state = self.lock();
        state.check_object(&ar.kind, &key)?;
        state.run_concurrent_writer(&ar.kind, &key);

        let map_key = (ar.kind.clone(), key.clone());
        let Some(current) = state.objects.get(&map_key) else {
            return Err(Error::not_found(&ar.kind, key.to_string()));
        };
        if let Some(sent) = obj.metadata.resource_version.as_deref() {
            if current.metadata.resource_version.as_deref() != Some(sent) {
                return Err(Error::conflict(
                    &ar.kind,
                    key.to_string(),
                    "the object has been modified; please apply your changes to the latest version and try again",
                ));
            }
        }
        let uid = current.metadata.uid.clone();
        let mut stored = obj.clone();
        stored.metadata.uid = uid;
        stored.metadata.resource_version = Some(state.bump());
        state.objects.insert(map_key, stored.clone());
        state.writes.push(Write::Update {
            kind: ar.kind.clone(),
            key,
        });
        Ok(stored)
    }

    async fn delete(&self, ar: &ApiResource, key: &ObjectKey) -> Result<()> {
        let mut state = self.lock();
        state.check_object(&ar.kind, key)?;
        if state.objects.contains_key(&(ar.kind.clone(), key.clone())) {
            state.delete_cascading(&ar.kind, key);
            state.writes.push(Write::Delete {
                kind: ar.kind.clone(),
                key: key.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let store = MemoryStore::new();
        let ar = MemoryStore::ar::<ConfigMap>();
        let created = store.create(&ar, &to_dynamic(&config_map("a")).unwrap()).await.unwrap();

        let mut first = created.clone();
        first.data["data"] = serde_json::json!({"k": "1"});
        store.update(&ar, &first).await.unwrap();

        // Still carries the creation resourceVersion
        let mut stale = created;
        stale.data["data"] = serde_json::json!({"k": "2"});
        let err = store.update(&ar, &stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_already_exists() {
        let store = MemoryStore::new();
        let ar = MemoryStore::ar::<ConfigMap>();
        let obj = to_dynamic(&config_map("a")).unwrap();
        store.create(&ar, &obj).await.unwrap();
        assert!(store.create(&ar, &obj).await.unwrap_err().is_already_exists());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_gc_follows_owner_references() {
        let store = MemoryStore::new();
        let parent = store.seed(&config_map("parent"));

        let mut child = config_map("child");
        child.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "parent".to_string(),
            uid: parent.uid().unwrap(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);
        store.seed(&child);
        store.seed(&config_map("bystander"));

        store.delete_with_gc::<ConfigMap>(&ObjectKey::namespaced("ns", "parent"));

        assert!(store.fetch::<ConfigMap>(&ObjectKey::namespaced("ns", "child")).is_none());
        assert!(store.fetch::<ConfigMap>(&ObjectKey::namespaced("ns", "bystander")).is_some());
    }

    #[tokio::test]
    async fn test_gc_leaves_cluster_scoped_dependents_of_namespaced_owners() {
        let store = MemoryStore::new();
        let parent = store.seed(&config_map("parent"));

        let owned_by_parent = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "parent".to_string(),
            uid: parent.uid().unwrap(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);
        store.seed(&Namespace {
            metadata: ObjectMeta {
                name: Some("orphan".to_string()),
                owner_references: owned_by_parent,
                ..Default::default()
            },
            ..Default::default()
        });

        store.delete_with_gc::<ConfigMap>(&ObjectKey::namespaced("ns", "parent"));

        assert!(store.fetch::<ConfigMap>(&ObjectKey::namespaced("ns", "parent")).is_none());
        assert!(store.fetch::<Namespace>(&ObjectKey::cluster("orphan")).is_some());
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_labels() {
        let store = MemoryStore::new();
        let mut labelled = config_map("labelled");
        labelled.metadata.labels = Some(BTreeMap::from([("app".to_string(), "x".to_string())]));
        store.seed(&labelled);
        store.seed(&config_map("plain"));
        let mut elsewhere = labelled.clone();
        elsewhere.metadata.namespace = Some("other".to_string());
        store.seed(&elsewhere);

        let selector = BTreeMap::from([("app".to_string(), "x".to_string())]);
        let ar = MemoryStore::ar::<ConfigMap>();
        assert_eq!(store.list(&ar, Some("ns"), &selector).await.unwrap().len(), 1);
        assert_eq!(store.list(&ar, None, &selector).await.unwrap().len(), 2);
        assert_eq!(store.list(&ar, Some("ns"), &BTreeMap::new()).await.unwrap().len(), 2);
    }
}
