//! Data connection secrets -> `storage-config`
//!
//! Any event on a managed secret re-aggregates its namespace. Deleted data
//! connections are no longer in the reflector cache, so their events are
//! also mapped onto the namespace's `storage-config` secret, which is.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use tracing::{debug, error, instrument};

use odh_common::{Error, Result};

use super::Context;
use crate::adapters::{StorageConfigAdapter, STORAGE_CONFIG_SECRET};

/// Retry delay after a failed aggregation
pub const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Re-aggregate the namespace of a changed managed secret
#[instrument(
    skip(secret, ctx),
    fields(secret = %secret.name_any(), namespace = %secret.namespace().unwrap_or_default())
)]
pub async fn reconcile(secret: Arc<Secret>, ctx: Arc<Context>) -> Result<Action> {
    let Some(namespace) = secret.namespace() else {
        return Ok(Action::await_change());
    };
    let outcome = ctx.engine.reconcile(&StorageConfigAdapter, &namespace).await?;
    debug!(?outcome, "storage config aggregated");
    Ok(Action::await_change())
}

/// Requeue failed aggregations after [`ERROR_REQUEUE`]
pub fn error_policy(secret: Arc<Secret>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        error = %error,
        secret = %secret.name_any(),
        "storage config aggregation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}

/// Map a data connection event to its namespace's `storage-config`
pub fn storage_config_ref(secret: Secret) -> Option<ObjectRef<Secret>> {
    if secret.name_any() == STORAGE_CONFIG_SECRET {
        return None;
    }
    let namespace = secret.namespace()?;
    Some(ObjectRef::new(STORAGE_CONFIG_SECRET).within(&namespace))
}
