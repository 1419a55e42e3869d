//! Events on InferenceServices
//!
//! A failed reconcile pass leaves a Warning on the model so `kubectl describe
//! isvc` shows which adapter broke. Publishing is best effort: a rejected
//! Event is logged and the pass result stands unchanged.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Environment variable carrying the pod name (downward API)
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Sink for Events about a reconciled object
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Record `reason`/`action` on `resource_ref`, with an optional message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes through the cluster's events API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Publisher reporting as `controller_name` from this pod
    pub fn new(client: Client, controller_name: &str) -> Self {
        let instance = std::env::var(POD_NAME_ENV).ok();
        Self {
            recorder: Recorder::new(client, reporter(controller_name, instance)),
        }
    }
}

/// `reportingController` plus, when known, `reportingInstance`
fn reporter(controller_name: &str, instance: Option<String>) -> Reporter {
    Reporter {
        controller: controller_name.to_string(),
        instance: instance.filter(|i| !i.is_empty()),
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                object = resource_ref.name.as_deref().unwrap_or_default(),
                reason,
                error = %e,
                "event rejected, dropping"
            );
        }
    }
}

/// Discards every Event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons
pub mod reasons {
    /// A child adapter failed during a reconcile pass
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
}

/// Event actions
pub mod actions {
    /// Reconciling child resources
    pub const RECONCILE: &str = "Reconcile";
}
