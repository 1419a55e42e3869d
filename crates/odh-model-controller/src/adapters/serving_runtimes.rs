//! Default ServingRuntimes seeded into every namespace with an InferenceService
//!
//! The catalogue lives in the operator namespace as a ConfigMap
//! `servingruntimes-config` whose `servingruntimes_config.yaml` key holds
//! another ConfigMap manifest; each value of that inner ConfigMap is one
//! ServingRuntime manifest.
//!
//! Runtimes are shared by every model in the namespace and users tune them
//! after creation, so the set is additive-only: missing runtimes are created,
//! existing ones are never updated or removed.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use tracing::warn;

use odh_common::crd::{InferenceService, ServingRuntime};
use odh_common::{Error, Result};

use super::parent_namespace;
use crate::engine::SetAdapter;
use crate::store::{get_typed, ObjectKey, ObjectStore};

/// ConfigMap holding the runtime catalogue
pub const RUNTIMES_CONFIG_MAP: &str = "servingruntimes-config";
/// Key of the catalogue inside the ConfigMap
pub const RUNTIMES_CONFIG_KEY: &str = "servingruntimes_config.yaml";

/// Seeds catalogue runtimes into the parent's namespace
pub struct ServingRuntimeSetAdapter {
    operator_namespace: String,
}

impl ServingRuntimeSetAdapter {
    /// Adapter reading the catalogue from `operator_namespace`
    pub fn new(operator_namespace: impl Into<String>) -> Self {
        Self {
            operator_namespace: operator_namespace.into(),
        }
    }
}

#[async_trait]
impl SetAdapter for ServingRuntimeSetAdapter {
    type Parent = InferenceService;
    type Member = ServingRuntime;
    /// Raw catalogue entries, `(key, manifest)`
    type Inputs = Vec<(String, String)>;

    fn name(&self) -> &'static str {
        "ServingRuntimeSet"
    }

    fn namespace(&self, isvc: &InferenceService) -> Result<String> {
        parent_namespace(isvc)
    }

    async fn inputs(&self, store: &dyn ObjectStore, _parent: &InferenceService) -> Result<Vec<(String, String)>> {
        let key = ObjectKey::namespaced(&self.operator_namespace, RUNTIMES_CONFIG_MAP);
        let Some(config) = get_typed::<ConfigMap>(store, &key).await? else {
            warn!(config_map = %key, "serving runtime catalogue not found, seeding nothing");
            return Ok(Vec::new());
        };
        let Some(raw) = config.data.as_ref().and_then(|d| d.get(RUNTIMES_CONFIG_KEY)) else {
            warn!(config_map = %key, key = RUNTIMES_CONFIG_KEY, "catalogue key missing, seeding nothing");
            return Ok(Vec::new());
        };

        let inner: ConfigMap = serde_yaml::from_str(raw)
            .map_err(|e| Error::invalid_manifest(RUNTIMES_CONFIG_KEY, e.to_string()))?;
        Ok(inner.data.unwrap_or_default().into_iter().collect())
    }

    fn desired(&self, isvc: &InferenceService, entries: Vec<(String, String)>) -> Vec<ServingRuntime> {
        let namespace = parent_namespace(isvc).unwrap_or_default();
        let (runtimes, errors) = decode_catalogue(entries);
        for e in &errors {
            warn!(error = %e, "skipping invalid serving runtime manifest");
        }
        runtimes
            .into_iter()
            .map(|mut rt| {
                rt.metadata.namespace = Some(namespace.clone());
                rt
            })
            .collect()
    }

    // Always reports drift so every pass re-checks for missing runtimes
    fn matches(&self, _desired: &[ServingRuntime], _observed: &[ServingRuntime]) -> bool {
        false
    }
}

/// Decode catalogue entries one by one; a broken entry never hides the others
pub fn decode_catalogue(entries: Vec<(String, String)>) -> (Vec<ServingRuntime>, Vec<Error>) {
    let mut runtimes = Vec::new();
    let mut errors = Vec::new();
    for (key, manifest) in entries {
        match serde_yaml::from_str::<ServingRuntime>(&manifest) {
            Ok(rt) if rt.metadata.name.as_deref().is_some_and(|n| !n.is_empty()) => runtimes.push(rt),
            Ok(_) => errors.push(Error::invalid_manifest(key, "metadata.name is missing")),
            Err(e) => errors.push(Error::invalid_manifest(key, e.to_string())),
        }
    }
    (runtimes, errors)
}
