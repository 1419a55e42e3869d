//! Controller runner - builds the controller futures
//!
//! Each `build_*` function returns a boxed future so `main` can join them
//! and tests never need a cluster to construct the reconcilers themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource, ResourceExt};

use odh_common::crd::{InferenceService, Route, ServiceMeshMember, ServingRuntime, VirtualService};
use odh_common::ODH_MANAGED_LABEL;

use crate::adapters::MODELMESH_SERVICE_ACCOUNT;
use crate::controller::{inference_service, storage_secret, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A controller future ready to be joined
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

/// Build every controller future
pub fn build_controllers(client: Client, ctx: Arc<Context>) -> Vec<ControllerFuture> {
    vec![
        build_inference_service_controller(client.clone(), ctx.clone()),
        build_storage_secret_controller(client, ctx),
    ]
}

/// InferenceService controller, triggered by the model and by its children
pub fn build_inference_service_controller(client: Client, ctx: Arc<Context>) -> ControllerFuture {
    let isvcs: Api<InferenceService> = Api::all(client.clone());

    let controller = Controller::new(isvcs, watcher_config());
    let models = controller.store();

    let mut controller = controller
        // Annotation flips on a runtime change the route policy of every model using it
        .watches(
            Api::<ServingRuntime>::all(client.clone()),
            watcher_config(),
            move |runtime| runtime_dependents(&runtime, &models.state()),
        )
        .owns(Api::<Route>::all(client.clone()), watcher_config())
        .owns(
            Api::<ServiceAccount>::all(client.clone()),
            watcher_config().fields(&format!("metadata.name={MODELMESH_SERVICE_ACCOUNT}")),
        )
        // Cluster-scoped: the owner's namespace comes from the binding's subject
        .watches(
            Api::<ClusterRoleBinding>::all(client.clone()),
            watcher_config(),
            |crb| binding_parent(&crb),
        );

    if ctx.config.virtual_service_enabled {
        tracing::info!("- VirtualService ownership watch");
        controller = controller.owns(Api::<VirtualService>::all(client.clone()), watcher_config());
    }
    if ctx.config.mesh_member_enabled {
        tracing::info!("- ServiceMeshMember ownership watch");
        controller = controller.owns(Api::<ServiceMeshMember>::all(client), watcher_config());
    }

    tracing::info!("- InferenceService controller");

    Box::pin(
        controller
            .shutdown_on_signal()
            .run(
                inference_service::reconcile,
                inference_service::error_policy,
                ctx,
            )
            .for_each(log_reconcile_result("InferenceService")),
    )
}

/// Storage secret controller, aggregating data connections per namespace
pub fn build_storage_secret_controller(client: Client, ctx: Arc<Context>) -> ControllerFuture {
    let managed = format!("{ODH_MANAGED_LABEL}=true");
    let secrets: Api<Secret> = Api::all(client);

    tracing::info!("- StorageSecret controller");

    Box::pin(
        Controller::new(secrets.clone(), watcher_config().labels(&managed))
            .watches(
                secrets,
                watcher_config().labels(&managed),
                storage_secret::storage_config_ref,
            )
            .shutdown_on_signal()
            .run(storage_secret::reconcile, storage_secret::error_policy, ctx)
            .for_each(log_reconcile_result("StorageSecret")),
    )
}

/// InferenceServices in the runtime's namespace that reference it by name
fn runtime_dependents(
    runtime: &ServingRuntime,
    models: &[Arc<InferenceService>],
) -> Vec<ObjectRef<InferenceService>> {
    let Some(namespace) = runtime.namespace() else {
        return Vec::new();
    };
    let name = runtime.name_any();
    let affected: Vec<ObjectRef<InferenceService>> = models
        .iter()
        .filter(|isvc| isvc.namespace().as_deref() == Some(namespace.as_str()))
        .filter(|isvc| isvc.runtime_name() == Some(name.as_str()))
        .map(|isvc| ObjectRef::from_obj(isvc.as_ref()))
        .collect();

    tracing::debug!(
        serving_runtime = %name,
        namespace = %namespace,
        affected_count = affected.len(),
        "serving runtime changed, requeueing its models"
    );
    affected
}

/// InferenceService controlling a ClusterRoleBinding
fn binding_parent(crb: &ClusterRoleBinding) -> Option<ObjectRef<InferenceService>> {
    let kind = InferenceService::kind(&());
    let api_version = InferenceService::api_version(&());
    let owner = crb.metadata.owner_references.as_ref()?.iter().find(|r| {
        r.controller == Some(true) && r.kind == kind && r.api_version == api_version
    })?;
    let namespace = crb
        .subjects
        .as_ref()?
        .iter()
        .find_map(|s| s.namespace.as_deref())?;
    Some(ObjectRef::new(&owner.name).within(namespace))
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use k8s_openapi::api::rbac::v1::Subject;
    use kube::api::ObjectMeta;

    use crate::adapters::fixtures::inference_service;

    fn binding(owner: Option<&InferenceService>, subject_ns: Option<&str>) -> ClusterRoleBinding {
        ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some("models-modelmesh-serving-sa-auth-delegator".to_string()),
                owner_references: owner.map(|o| vec![o.controller_owner_ref(&()).unwrap()]),
                ..Default::default()
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: MODELMESH_SERVICE_ACCOUNT.to_string(),
                namespace: subject_ns.map(str::to_string),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_binding_maps_to_owning_inference_service() {
        let isvc = inference_service("models", "mnist", None);
        let parent = binding_parent(&binding(Some(&isvc), Some("models"))).unwrap();
        assert_eq!(parent.name, "mnist");
        assert_eq!(parent.namespace.as_deref(), Some("models"));
    }

    fn runtime(namespace: &str, name: &str) -> ServingRuntime {
        let mut rt: ServingRuntime = serde_yaml::from_str(
            "apiVersion: serving.kserve.io/v1alpha1\nkind: ServingRuntime\nmetadata: {}\nspec: {}\n",
        )
        .unwrap();
        rt.metadata.name = Some(name.to_string());
        rt.metadata.namespace = Some(namespace.to_string());
        rt
    }

    #[test]
    fn test_runtime_change_maps_to_models_using_it() {
        let models: Vec<Arc<InferenceService>> = vec![
            Arc::new(inference_service("models", "mnist", Some("ovms"))),
            Arc::new(inference_service("models", "resnet", Some("ovms"))),
            Arc::new(inference_service("models", "bert", Some("triton"))),
            Arc::new(inference_service("models", "plain", None)),
            Arc::new(inference_service("other", "mnist", Some("ovms"))),
        ];

        let mut affected: Vec<String> = runtime_dependents(&runtime("models", "ovms"), &models)
            .into_iter()
            .inspect(|r| assert_eq!(r.namespace.as_deref(), Some("models")))
            .map(|r| r.name)
            .collect();
        affected.sort();
        assert_eq!(affected, vec!["mnist", "resnet"]);

        assert!(runtime_dependents(&runtime("models", "unused"), &models).is_empty());
    }

    #[test]
    fn test_unowned_or_subjectless_bindings_are_ignored() {
        let isvc = inference_service("models", "mnist", None);
        assert!(binding_parent(&binding(None, Some("models"))).is_none());
        assert!(binding_parent(&binding(Some(&isvc), None)).is_none());
    }
}
