//! ReconcileEngine - the create-or-repair loop shared by every child kind
//!
//! An adapter describes one child kind with pure functions (desired state,
//! drift comparison, field merge, owner link) plus one async read of the
//! external inputs it needs. The engine owns all control flow:
//!
//! ```text
//! observed   presence     action
//! --------   ----------   ------------------------------------------
//! missing    Required     attach owner, create (already-exists is fine)
//! missing    Absent       nothing
//! missing    RepairOnly   nothing
//! present    Absent       delete
//! present    *            compare; on drift re-read, merge, update
//! ```
//!
//! Desired state is recomputed on every call and never cached, so a pass
//! after a missed event, a restart or a manual edit converges the same way.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use odh_common::kube_utils::{set_controller_owner, strip_server_metadata};
use odh_common::retry::{retry_on_conflict, RetryConfig};
use odh_common::{Error, Result};

use crate::store::{api_resource, from_dynamic, to_dynamic, ObjectKey, ObjectStore};

// =============================================================================
// Adapter contract
// =============================================================================

/// Whether a child should exist under the current policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// Create when missing, repair when drifted
    Required,
    /// Delete when present
    Absent,
    /// Never create or delete; repair drift when present
    RepairOnly,
}

/// A freshly computed desired child
#[derive(Clone, Debug)]
pub struct Desired<K> {
    /// The object as it should look (owned fields only)
    pub object: K,
    /// Existence policy
    pub presence: Presence,
}

impl<K> Desired<K> {
    /// Child that must exist
    pub fn required(object: K) -> Self {
        Self {
            object,
            presence: Presence::Required,
        }
    }

    /// Child that must not exist (the object only carries its identity)
    pub fn absent(object: K) -> Self {
        Self {
            object,
            presence: Presence::Absent,
        }
    }

    /// Child that is repaired but never created or deleted
    pub fn repair_only(object: K) -> Self {
        Self {
            object,
            presence: Presence::RepairOnly,
        }
    }
}

/// What a reconcile call did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The child was created
    Created,
    /// Drift was repaired
    Updated,
    /// The child was deleted because policy says it must not exist
    Deleted,
    /// Already converged
    Unchanged,
    /// Nothing to do (child absent and not wanted, or precondition missing)
    Skipped,
}

impl Outcome {
    /// True when the call wrote to the store
    pub fn wrote(self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated | Outcome::Deleted)
    }
}

/// One child kind plugged into the engine
#[async_trait]
pub trait ChildAdapter: Send + Sync {
    /// The object that drives this child
    type Parent: Send + Sync;
    /// The child kind
    type Child: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync;
    /// External state read before computing the desired child
    type Inputs: Send;

    /// Short name for logs, events and failure reports
    fn name(&self) -> &'static str;

    /// Read everything `desired` needs from the store
    async fn inputs(&self, store: &dyn ObjectStore, parent: &Self::Parent) -> Result<Self::Inputs>;

    /// Compute the desired child (pure)
    fn desired(&self, parent: &Self::Parent, inputs: Self::Inputs) -> Result<Desired<Self::Child>>;

    /// True when `observed` already carries every owned field of `desired` (pure)
    fn matches(&self, desired: &Self::Child, observed: &Self::Child) -> bool;

    /// Copy the owned fields of `desired` onto the latest observed object (pure)
    fn merge(&self, desired: &Self::Child, latest: &mut Self::Child);

    /// Controller reference to attach on create, `None` for unowned children
    fn owner(&self, _parent: &Self::Parent) -> Option<OwnerReference> {
        None
    }
}

/// An additive-only collection of children keyed by name
///
/// Members that exist are never updated or deleted; members that are
/// missing are created. Used for objects shared by every parent in a
/// namespace.
#[async_trait]
pub trait SetAdapter: Send + Sync {
    /// The object that drives this set
    type Parent: Send + Sync;
    /// The member kind
    type Member: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync;
    /// External state read before computing the desired members
    type Inputs: Send;

    /// Short name for logs, events and failure reports
    fn name(&self) -> &'static str;

    /// Namespace the set lives in
    fn namespace(&self, parent: &Self::Parent) -> Result<String>;

    /// Read everything `desired` needs from the store
    async fn inputs(&self, store: &dyn ObjectStore, parent: &Self::Parent) -> Result<Self::Inputs>;

    /// Compute the desired members (pure)
    fn desired(&self, parent: &Self::Parent, inputs: Self::Inputs) -> Vec<Self::Member>;

    /// Set-level comparison (pure)
    fn matches(&self, desired: &[Self::Member], observed: &[Self::Member]) -> bool;
}

// =============================================================================
// Engine
// =============================================================================

/// Runs adapters against an [`ObjectStore`]
#[derive(Clone)]
pub struct ReconcileEngine {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl ReconcileEngine {
    /// Engine with an injected store and conflict retry policy
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// The store this engine writes through
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Converge one child of `parent`
    pub async fn reconcile<A: ChildAdapter>(&self, adapter: &A, parent: &A::Parent) -> Result<Outcome> {
        let inputs = adapter.inputs(self.store.as_ref(), parent).await?;
        let Desired { object, presence } = adapter.desired(parent, inputs)?;

        let ar = api_resource::<A::Child>();
        let key = ObjectKey::of(&object)?;
        let observed = self.store.get(&ar, &key).await?;

        match (observed, presence) {
            (None, Presence::Absent) => {
                debug!(adapter = adapter.name(), name = %key, "child absent and not wanted");
                Ok(Outcome::Skipped)
            }
            (None, Presence::RepairOnly) => {
                warn!(adapter = adapter.name(), name = %key, "object to repair does not exist, skipping");
                Ok(Outcome::Skipped)
            }
            (None, Presence::Required) => {
                let object = self.prepare_create(adapter, parent, object);
                match self.create(&object).await {
                    Ok(()) => {
                        info!(adapter = adapter.name(), name = %key, "created");
                        Ok(Outcome::Created)
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(adapter = adapter.name(), name = %key, "lost create race, next pass repairs");
                        Ok(Outcome::Unchanged)
                    }
                    Err(e) => Err(e),
                }
            }
            (Some(_), Presence::Absent) => {
                self.store.delete(&ar, &key).await?;
                info!(adapter = adapter.name(), name = %key, "deleted, policy no longer wants it");
                Ok(Outcome::Deleted)
            }
            (Some(observed), presence) => {
                let observed: A::Child = from_dynamic(observed)?;
                if adapter.matches(&object, &observed) {
                    debug!(adapter = adapter.name(), name = %key, "in sync");
                    return Ok(Outcome::Unchanged);
                }
                info!(adapter = adapter.name(), name = %key, "drift detected, repairing");
                self.repair(adapter, parent, &object, &key, presence).await
            }
        }
    }

    /// Read-latest / merge / write under conflict retry
    async fn repair<A: ChildAdapter>(
        &self,
        adapter: &A,
        parent: &A::Parent,
        desired: &A::Child,
        key: &ObjectKey,
        presence: Presence,
    ) -> Result<Outcome> {
        let ar = api_resource::<A::Child>();
        let ar = &ar;
        let operation = format!("repair {} {}", adapter.name(), key);

        retry_on_conflict(&self.retry, &operation, || async move {
            let Some(latest) = self.store.get(ar, key).await? else {
                // Deleted between compare and repair
                if presence == Presence::RepairOnly {
                    return Ok(Outcome::Skipped);
                }
                let object = self.prepare_create(adapter, parent, desired.clone());
                return match self.create(&object).await {
                    Ok(()) => Ok(Outcome::Created),
                    // Recreated concurrently: re-read and merge on the next attempt
                    Err(e) if e.is_already_exists() => Err(Error::conflict(
                        &ar.kind,
                        key.to_string(),
                        "object recreated during repair",
                    )),
                    Err(e) => Err(e),
                };
            };

            let mut latest: A::Child = from_dynamic(latest)?;
            adapter.merge(desired, &mut latest);
            self.store.update(ar, &to_dynamic(&latest)?).await?;
            Ok(Outcome::Updated)
        })
        .await
    }

    fn prepare_create<A: ChildAdapter>(&self, adapter: &A, parent: &A::Parent, mut object: A::Child) -> A::Child {
        strip_server_metadata(object.meta_mut());
        if let Some(owner) = adapter.owner(parent) {
            set_controller_owner(object.meta_mut(), owner);
        }
        object
    }

    async fn create<K>(&self, object: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        self.store
            .create(&api_resource::<K>(), &to_dynamic(object)?)
            .await
            .map(|_| ())
    }

    /// Converge an additive-only set of children
    ///
    /// Every missing member is attempted even when an earlier one fails; the
    /// failures are reported together afterwards.
    pub async fn reconcile_set<A: SetAdapter>(&self, adapter: &A, parent: &A::Parent) -> Result<Outcome> {
        let namespace = adapter.namespace(parent)?;
        let inputs = adapter.inputs(self.store.as_ref(), parent).await?;
        let desired = adapter.desired(parent, inputs);

        let ar = api_resource::<A::Member>();
        let observed: Vec<A::Member> = self
            .store
            .list(&ar, Some(namespace.as_str()), &Default::default())
            .await?
            .into_iter()
            .map(from_dynamic)
            .collect::<Result<_>>()?;

        if adapter.matches(&desired, &observed) {
            debug!(adapter = adapter.name(), namespace = %namespace, "set in sync");
            return Ok(Outcome::Unchanged);
        }

        let existing: BTreeSet<String> = observed
            .iter()
            .filter_map(|m| m.meta().name.clone())
            .collect();

        let mut created = 0usize;
        let mut failures: Vec<String> = Vec::new();
        for mut member in desired {
            let Some(name) = member.meta().name.clone() else {
                warn!(adapter = adapter.name(), "desired member has no name, skipping");
                continue;
            };
            if existing.contains(&name) {
                continue;
            }
            strip_server_metadata(member.meta_mut());
            member.meta_mut().namespace = Some(namespace.clone());
            match self.create(&member).await {
                Ok(()) => {
                    info!(adapter = adapter.name(), namespace = %namespace, name = %name, "created member");
                    created += 1;
                }
                Err(e) if e.is_already_exists() => {}
                Err(e) => {
                    warn!(adapter = adapter.name(), namespace = %namespace, name = %name, error = %e, "failed to create member");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::internal_with_context(
                adapter.name(),
                format!("failed to create {} in {}", failures.join("; "), namespace),
            ));
        }
        Ok(if created > 0 {
            Outcome::Created
        } else {
            Outcome::Unchanged
        })
    }
}
