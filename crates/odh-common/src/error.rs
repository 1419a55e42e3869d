//! Error types for the ODH model controller
//!
//! Errors carry the kind and name of the object involved so a failed
//! reconcile pass can be traced back to a single child resource. The
//! object-store variants (`NotFound`, `AlreadyExists`, `Conflict`) drive the
//! engine's control flow; everything else is surfaced to the trigger caller.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for ODH model controller operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error that is not one of the classified store errors
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The requested object does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Namespaced name of the object
        name: String,
    },

    /// A create raced with another writer that created the object first
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Namespaced name of the object
        name: String,
    },

    /// Optimistic concurrency failure: the write carried a stale resourceVersion
    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Namespaced name of the object
        name: String,
        /// Server-provided message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// An embedded manifest could not be decoded into a usable object
    #[error("invalid manifest {name}: {message}")]
    InvalidManifest {
        /// Key of the manifest inside its config source
        name: String,
        /// Description of what's invalid
        message: String,
    },

    /// Validation error for parent objects
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Namespaced name of the offending object
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// One or more adapters failed during a reconcile pass
    #[error("reconcile pass for {parent} failed in: {}", failed.join(", "))]
    PassFailed {
        /// Namespaced name of the parent the pass ran for
        parent: String,
        /// Names of the adapters that failed
        failed: Vec<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "engine", "store", "controller")
        context: String,
    },
}

impl Error {
    /// Classify a kube-rs error for an operation on `kind`/`name`.
    ///
    /// 404 becomes `NotFound`; 409 becomes `AlreadyExists` when the API server
    /// reports reason `AlreadyExists` and `Conflict` otherwise. Anything else
    /// is kept as a raw `Kube` error.
    pub fn from_kube(kind: impl Into<String>, name: impl Into<String>, source: kube::Error) -> Self {
        match &source {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind: kind.into(),
                name: name.into(),
            },
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind: kind.into(),
                    name: name.into(),
                }
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind: kind.into(),
                name: name.into(),
                message: ae.message.clone(),
            },
            _ => Self::Kube { source },
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an invalid-manifest error
    pub fn invalid_manifest(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidManifest {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error for the given object
    pub fn validation(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// True for optimistic concurrency failures
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True when the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when a create lost the race to another writer
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Check if this error is worth retrying by redelivering the trigger
    ///
    /// Invalid input (manifests, parent validation, serialization) needs a
    /// config fix first. Kubernetes 4xx errors other than conflicts are
    /// permission or schema problems and are equally permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::NotFound { .. } => true,
            Error::AlreadyExists { .. } => true,
            Error::Conflict { .. } => true,
            Error::Serialization { .. } => false,
            Error::InvalidManifest { .. } => false,
            Error::Validation { .. } => false,
            Error::PassFailed { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}
