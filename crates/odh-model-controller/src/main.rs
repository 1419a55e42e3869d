//! ODH model controller - ModelMesh companion controller for InferenceServices

use std::sync::Arc;

use clap::Parser;
use kube::Client;

use odh_common::events::KubeEventPublisher;
use odh_common::retry::{retry_with_backoff, RetryConfig};
use odh_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};

use odh_model_controller::config::{resolve_operator_namespace, ControllerConfig};
use odh_model_controller::controller::Context;
use odh_model_controller::controller_runner::build_controllers;
use odh_model_controller::store::KubeStore;

const CONTROLLER_NAME: &str = "odh-model-controller";

/// Reconciles the routing, RBAC, mesh and storage objects ModelMesh models need
#[derive(Parser, Debug)]
#[command(name = "odh-model-controller", version, about, long_about = None)]
struct Cli {
    /// Namespace holding the serving runtime catalogue
    /// (default: the pod's own namespace)
    #[arg(long, env = "POD_NAMESPACE")]
    operator_namespace: Option<String>,

    /// Create a ServiceMeshMember in every namespace with a model
    #[arg(long, env = "ODH_ENABLE_MESH_MEMBER")]
    enable_mesh_member: bool,

    /// Do not manage the per-model VirtualService
    #[arg(long, env = "ODH_DISABLE_VIRTUAL_SERVICE")]
    disable_virtual_service: bool,

    /// Attempts for a read-merge-write cycle that keeps hitting conflicts
    #[arg(long, env = "ODH_CONFLICT_RETRIES", default_value_t = 5)]
    conflict_retries: u32,

    /// Log output format (json or text)
    #[arg(long, env = "ODH_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Cli {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            operator_namespace: resolve_operator_namespace(self.operator_namespace.clone()),
            mesh_member_enabled: self.enable_mesh_member,
            virtual_service_enabled: !self.disable_virtual_service,
            conflict_retry: RetryConfig::conflict_attempts(self.conflict_retries),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider before any TLS client is built
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        service_name: CONTROLLER_NAME.to_string(),
        format: cli.log_format,
    })?;

    let config = cli.controller_config();
    tracing::info!(
        operator_namespace = %config.operator_namespace,
        mesh_member = config.mesh_member_enabled,
        virtual_service = config.virtual_service_enabled,
        conflict_retries = config.conflict_retry.max_attempts,
        "starting controllers"
    );

    let client = retry_with_backoff(
        &RetryConfig::with_max_attempts(5),
        "create kubernetes client",
        Client::try_default,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let ctx = Arc::new(Context::new(
        Arc::new(KubeStore::new(client.clone())),
        config,
        Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
    ));

    futures::future::join_all(build_controllers(client, ctx)).await;

    tracing::info!("controllers stopped");
    Ok(())
}
