//! Label and ownership helpers shared by the resource adapters
//!
//! Children reconciled by the controller share other actors' objects: an
//! admin may add labels, the ingress controller may add owner references.
//! The helpers here therefore work on the *owned subset* of metadata and
//! leave everything else alone.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

// =============================================================================
// Labels
// =============================================================================

/// True when every desired label is present on the observed object with the same value.
///
/// Extra observed labels are ignored: they belong to somebody else.
pub fn labels_match(desired: &BTreeMap<String, String>, observed: Option<&BTreeMap<String, String>>) -> bool {
    if desired.is_empty() {
        return true;
    }
    let Some(observed) = observed else {
        return false;
    };
    desired
        .iter()
        .all(|(key, value)| observed.get(key) == Some(value))
}

/// Copy the desired labels onto `target`, keeping labels that are not desired.
pub fn merge_labels(desired: &BTreeMap<String, String>, target: &mut Option<BTreeMap<String, String>>) {
    if desired.is_empty() {
        return;
    }
    let labels = target.get_or_insert_with(BTreeMap::new);
    for (key, value) in desired {
        labels.insert(key.clone(), value.clone());
    }
}

/// Render an equality label selector (`a=b,c=d`) in key order.
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build a label map from static pairs.
pub fn labels<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Ownership
// =============================================================================

/// Make `owner` the controller of the object described by `meta`.
///
/// An existing controller reference is replaced (an object has at most one
/// controller); non-controller references from other actors are kept.
pub fn set_controller_owner(meta: &mut ObjectMeta, owner: OwnerReference) {
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != owner.uid && r.controller != Some(true));
    refs.push(owner);
}

/// Strip server-populated metadata so an object can be created from a manifest.
///
/// Removes fields that would make a create fail or misbehave:
/// - uid: identity of a previous incarnation
/// - resourceVersion: stale concurrency token
/// - creationTimestamp, generation, managedFields: server-maintained bookkeeping
pub fn strip_server_metadata(meta: &mut ObjectMeta) {
    meta.uid = None;
    meta.resource_version = None;
    meta.creation_timestamp = None;
    meta.managed_fields = None;
    meta.generation = None;
}

/// `namespace/name` display form used in logs and errors
pub fn namespaced_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}
