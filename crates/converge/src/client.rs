//! External API client seam
//!
//! The [`ApiClient`] trait abstracts the remote admin API, enabling:
//! - A real HTTP implementation owned by the orchestrator
//! - An in-memory fake for testing
//!
//! Calls are synchronous request/response. Implementations do their own
//! transport, authentication and retries; the engine propagates their
//! errors as-is.

use crate::canonical;
use crate::error::{RemoteResult, Result};
use crate::schema::KindSchema;
use crate::types::{Attributes, Identity};

/// Answer to a successful create
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    /// Identity the service assigned
    pub identity: Identity,
    /// Attributes in the create response, possibly partial
    pub observed: Attributes,
}

/// Remote operations the lifecycle controller needs, per object kind
///
/// Opaque-json attributes are sent as structured JSON and may be returned
/// either structured or as text.
pub trait ApiClient: Send + Sync {
    /// Create an object from the declared attributes
    fn create(&self, kind: &KindSchema, declared: &Attributes) -> RemoteResult<Created>;

    /// Fetch the current remote attributes
    ///
    /// Must return [`crate::RemoteError::NotFound`] when the object does not exist.
    fn read(&self, kind: &KindSchema, identity: &Identity) -> RemoteResult<Attributes>;

    /// Send changed attributes only
    fn update(
        &self,
        kind: &KindSchema,
        identity: &Identity,
        changed: &Attributes,
    ) -> RemoteResult<Attributes>;

    fn delete(&self, kind: &KindSchema, identity: &Identity) -> RemoteResult<()>;
}

/// Request payload for a set of caller attributes
///
/// Unset values and attributes the caller may not set are dropped;
/// document text is parsed into structured JSON.
pub fn request_body(kind: &KindSchema, attributes: &Attributes) -> Result<Attributes> {
    let mut body = Attributes::new();
    for (name, value) in attributes {
        if value.is_null() {
            continue;
        }
        let Some(spec) = kind.get(name) else {
            continue;
        };
        if !spec.mutability.caller_may_set() {
            continue;
        }
        let value = if spec.is_document() {
            canonical::document_of(spec.name, value)?
        } else {
            value.clone()
        };
        body.insert(name.clone(), value);
    }
    Ok(body)
}
