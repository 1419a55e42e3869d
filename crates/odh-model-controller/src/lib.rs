//! ODH model controller
//!
//! Keeps the cluster objects a ModelMesh InferenceService needs (Route,
//! service account and auth-delegator binding, mesh membership, gateway
//! routing, default serving runtimes, and the namespace's `storage-config`
//! secret) converged with what the model and its namespace ask for.

#![deny(missing_docs)]

/// Child resource adapters
pub mod adapters;
/// Startup configuration
pub mod config;
/// Reconcile pass orchestration and reconcilers
pub mod controller;
/// kube-rs controller wiring
pub mod controller_runner;
/// Create-or-repair engine shared by every adapter
pub mod engine;
/// Cluster access seam
pub mod store;
