//! InferenceService reconciler

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{error, info, instrument};

use odh_common::crd::InferenceService;
use odh_common::events::{actions, reasons};
use odh_common::kube_utils::namespaced_name;
use odh_common::{Error, Result};

use super::{run_pass, Context};

/// Periodic resync for converged InferenceServices
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(300);
/// Retry delay after a failed pass
pub const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Converge every child of one InferenceService
#[instrument(
    skip(isvc, ctx),
    fields(
        inference_service = %isvc.name_any(),
        namespace = %isvc.namespace().unwrap_or_default()
    )
)]
pub async fn reconcile(isvc: Arc<InferenceService>, ctx: Arc<Context>) -> Result<Action> {
    let parent = namespaced_name(isvc.namespace().as_deref(), &isvc.name_any());
    let report = run_pass(&ctx, &isvc).await;

    if report.failures.is_empty() {
        if report.wrote() {
            info!(outcomes = ?report.outcomes, ready = isvc.is_ready(), "children converged");
        }
        return Ok(Action::requeue(REQUEUE_INTERVAL));
    }

    let object_ref = isvc.object_ref(&());
    for (adapter, e) in &report.failures {
        error!(adapter, error = %e, "adapter failed");
        ctx.events
            .publish(
                &object_ref,
                EventType::Warning,
                reasons::RECONCILE_FAILED,
                actions::RECONCILE,
                Some(format!("{adapter}: {e}")),
            )
            .await;
    }
    report.into_result(parent).map(|_| Action::requeue(REQUEUE_INTERVAL))
}

/// Requeue failed passes after [`ERROR_REQUEUE`]
pub fn error_policy(isvc: Arc<InferenceService>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        error = %error,
        inference_service = %isvc.name_any(),
        retryable = error.is_retryable(),
        "inference service reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}
