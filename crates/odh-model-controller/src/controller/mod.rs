//! Reconcile pass orchestration
//!
//! One pass runs every adapter for one InferenceService, in a fixed order:
//!
//! ```text
//! Namespace -> ServingRuntimeSet -> Route -> ServiceAccount -> ClusterRoleBinding
//!   -> ServiceMeshMember (optional) -> VirtualService (optional) -> StorageConfig
//! ```
//!
//! A failing adapter never stops the ones after it. The pass as a whole fails
//! if any adapter failed, so the trigger is redelivered and the converged
//! adapters simply find nothing to do next time.

pub mod inference_service;
pub mod storage_secret;

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, warn};

use odh_common::crd::InferenceService;
use odh_common::events::EventPublisher;
use odh_common::kube_utils::namespaced_name;
use odh_common::{Error, Result};

use crate::adapters::{
    ClusterRoleBindingAdapter, MeshMemberAdapter, NamespaceAdapter, RouteAdapter,
    ServiceAccountAdapter, ServingRuntimeSetAdapter, StorageConfigAdapter, VirtualServiceAdapter,
};
use crate::config::ControllerConfig;
use crate::engine::{ChildAdapter, Outcome, ReconcileEngine, SetAdapter};
use crate::store::ObjectStore;

/// Shared state for both controllers
pub struct Context {
    /// Engine writing through the injected store
    pub engine: ReconcileEngine,
    /// Resolved startup configuration
    pub config: ControllerConfig,
    /// Sink for Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
}

impl Context {
    /// Build a context around a store
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: ControllerConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            engine: ReconcileEngine::new(store, config.conflict_retry.clone()),
            config,
            events,
        }
    }
}

/// What each adapter did during one pass
#[derive(Debug, Default)]
pub struct PassReport {
    /// Adapters that finished, in pass order
    pub outcomes: Vec<(&'static str, Outcome)>,
    /// Adapters that failed, in pass order
    pub failures: Vec<(&'static str, Error)>,
}

impl PassReport {
    fn record(&mut self, adapter: &'static str, result: Result<Outcome>) {
        match result {
            Ok(outcome) => self.outcomes.push((adapter, outcome)),
            Err(e) => {
                warn!(adapter, error = %e, "adapter failed, continuing pass");
                self.failures.push((adapter, e));
            }
        }
    }

    /// Outcome of one adapter, `None` if it failed or did not run
    pub fn outcome(&self, adapter: &str) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| *name == adapter)
            .map(|(_, outcome)| *outcome)
    }

    /// True when any adapter wrote to the store
    pub fn wrote(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.wrote())
    }

    /// `PassFailed` naming every failed adapter, or `Ok` when none failed
    pub fn into_result(self, parent: String) -> Result<Vec<(&'static str, Outcome)>> {
        if self.failures.is_empty() {
            return Ok(self.outcomes);
        }
        Err(Error::PassFailed {
            parent,
            failed: self.failures.iter().map(|(name, _)| name.to_string()).collect(),
        })
    }
}

async fn step<A: ChildAdapter>(report: &mut PassReport, engine: &ReconcileEngine, adapter: &A, parent: &A::Parent) {
    report.record(adapter.name(), engine.reconcile(adapter, parent).await);
}

async fn step_set<A: SetAdapter>(report: &mut PassReport, engine: &ReconcileEngine, adapter: &A, parent: &A::Parent) {
    report.record(adapter.name(), engine.reconcile_set(adapter, parent).await);
}

/// Run every enabled adapter once for `isvc`
pub async fn run_pass(ctx: &Context, isvc: &InferenceService) -> PassReport {
    let engine = &ctx.engine;
    let mut report = PassReport::default();

    step(&mut report, engine, &NamespaceAdapter, isvc).await;
    step_set(
        &mut report,
        engine,
        &ServingRuntimeSetAdapter::new(ctx.config.operator_namespace.clone()),
        isvc,
    )
    .await;
    step(&mut report, engine, &RouteAdapter, isvc).await;
    step(&mut report, engine, &ServiceAccountAdapter, isvc).await;
    step(&mut report, engine, &ClusterRoleBindingAdapter, isvc).await;
    if ctx.config.mesh_member_enabled {
        step(&mut report, engine, &MeshMemberAdapter, isvc).await;
    }
    if ctx.config.virtual_service_enabled {
        step(&mut report, engine, &VirtualServiceAdapter, isvc).await;
    }
    match isvc.namespace() {
        Some(namespace) => step(&mut report, engine, &StorageConfigAdapter, &namespace).await,
        None => report.record(
            StorageConfigAdapter.name(),
            Err(Error::validation(isvc.name_any(), "InferenceService has no namespace")),
        ),
    }

    debug!(
        inference_service = %namespaced_name(isvc.namespace().as_deref(), &isvc.name_any()),
        wrote = report.wrote(),
        failed = report.failures.len(),
        "reconcile pass finished"
    );
    report
}
