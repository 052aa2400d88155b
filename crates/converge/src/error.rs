//! Error types for the reconciliation engine
//!
//! [`Error`] is what engine internals propagate with `?`. The
//! orchestrator-facing entry points in [`crate::lifecycle`] turn these
//! into [`crate::Diagnostic`] entries instead of returning them raw.

use crate::types::{Operation, Status};
use thiserror::Error;

/// Failure reported by an [`crate::ApiClient`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote service has no object with the requested identity
    #[error("object not found")]
    NotFound,

    /// The remote service answered with a non-success status
    #[error("API request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Check if this is a not-found answer
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Errors that can occur while reconciling managed objects
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied opaque-json value is not well-formed
    #[error("attribute `{attribute}` is not a well-formed JSON document: {source}")]
    MalformedDocument {
        attribute: String,
        #[source]
        source: serde_json::Error,
    },

    /// Import token does not have the shape the kind expects
    #[error("invalid import token {token:?} for {kind}: expected {expected}")]
    InvalidImportToken {
        kind: String,
        token: String,
        expected: String,
    },

    /// Kind is not present in the registry
    #[error("unknown object kind: {0}")]
    UnknownKind(String),

    /// Kind can be looked up but never declared, imported or deleted
    #[error("{0} is read-only; it can only be looked up")]
    ReadOnlyKind(String),

    /// Declaration names an attribute the kind does not have
    #[error("{kind} has no attribute `{attribute}`")]
    UnknownAttribute { kind: String, attribute: String },

    /// Declaration is structurally invalid for its kind
    #[error("invalid value for `{attribute}`: {reason}")]
    InvalidDeclaration { attribute: String, reason: String },

    /// A call to the remote service failed
    #[error("{operation} {kind} failed: {source}")]
    Remote {
        operation: Operation,
        kind: String,
        #[source]
        source: RemoteError,
    },

    /// Lifecycle state machine was asked to make an illegal move
    #[error("illegal lifecycle transition {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    /// Object is past creation but carries no identity
    #[error("{kind} object in status {status} has no identity")]
    MissingIdentity { kind: String, status: Status },

    /// Worker pool for batch execution could not be started
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Identity is assigned once and never replaced
    #[error("identity already assigned ({existing}), refusing to overwrite with {proposed}")]
    IdentityConflict { existing: String, proposed: String },
}

impl Error {
    /// Wrap a remote failure with the operation and kind that produced it
    pub fn remote(operation: Operation, kind: &str, source: RemoteError) -> Self {
        Self::Remote {
            operation,
            kind: kind.to_string(),
            source,
        }
    }

    /// Check if this error is a remote not-found answer
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_not_found())
    }

    /// Attribute the error is about, if it is attribute-scoped
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::MalformedDocument { attribute, .. }
            | Self::UnknownAttribute { attribute, .. }
            | Self::InvalidDeclaration { attribute, .. } => Some(attribute),
            _ => None,
        }
    }

    /// Whether the error was raised locally, before any remote call
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Remote { .. })
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for [`crate::ApiClient`] calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_names_operation() {
        let err = Error::remote(
            Operation::Update,
            "guardrail",
            RemoteError::Status {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "update guardrail failed: API request failed with status 500: boom"
        );
        assert!(!err.is_local());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = Error::remote(Operation::Read, "workspace", RemoteError::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_malformed_document_is_attribute_scoped() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::MalformedDocument {
            attribute: "checks".into(),
            source,
        };
        assert_eq!(err.attribute(), Some("checks"));
        assert!(err.is_local());
    }
}
