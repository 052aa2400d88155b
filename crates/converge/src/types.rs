//! Core types for managed objects and their reconciliation outcomes

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name to value mapping
///
/// Scalars are stored as their JSON value. Opaque-json attributes are
/// stored as a JSON string holding the document text, so the caller's
/// formatting survives reconciliation.
pub type Attributes = BTreeMap<String, Value>;

/// Remote operation kinds, used for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a managed object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Declared but not known to the remote service
    #[default]
    Absent,
    /// Create was issued; the follow-up read has not landed yet
    Creating,
    /// Exists remotely and recorded state reflects it
    Active,
    /// Update in flight
    Updating,
    /// Delete in flight
    Deleting,
    /// Deleted; terminal
    Gone,
}

impl Status {
    /// Check whether the state machine allows moving to `next`
    ///
    /// `Active -> Active` is the read-reconcile cycle. There is no edge
    /// into `Deleting` except from `Active`.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::{Absent, Active, Creating, Deleting, Gone, Updating};
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Active)
                | (Active, Active)
                | (Active, Updating)
                | (Updating, Active)
                | (Active, Deleting)
                | (Deleting, Gone)
        )
    }

    /// Whether the object is known to exist remotely
    pub fn exists_remotely(self) -> bool {
        matches!(self, Self::Creating | Self::Active | Self::Updating | Self::Deleting)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Gone => "gone",
        };
        f.write_str(name)
    }
}

/// Server-assigned identity of a managed object
///
/// `parent` carries the scoping identifier for kinds that can only be
/// addressed inside another object (a member inside a workspace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Identity {
    /// Identity addressed by a single identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    /// Identity scoped inside a parent object
    pub fn scoped(parent: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{parent}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A managed object instance: kind, identity, recorded state and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
    /// Values the reconciler decided to persist after the last cycle
    #[serde(default)]
    pub recorded: Attributes,
    #[serde(default)]
    status: Status,
}

impl ManagedObject {
    /// A fresh, not-yet-created instance of `kind`
    pub fn absent(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identity: None,
            recorded: Attributes::new(),
            status: Status::Absent,
        }
    }

    /// An instance known only by identity, as produced by import
    ///
    /// Recorded state starts empty so the first read adopts whatever the
    /// remote service returns.
    pub fn imported(kind: impl Into<String>, identity: Identity) -> Self {
        Self {
            kind: kind.into(),
            identity: Some(identity),
            recorded: Attributes::new(),
            status: Status::Creating,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Assign the server identity
    ///
    /// Re-assigning the same identity is a no-op; a different one is
    /// rejected.
    pub fn assign_identity(&mut self, identity: Identity) -> Result<()> {
        match &self.identity {
            Some(existing) if *existing == identity => Ok(()),
            Some(existing) => Err(Error::IdentityConflict {
                existing: existing.to_string(),
                proposed: identity.to_string(),
            }),
            None => {
                self.identity = Some(identity);
                Ok(())
            }
        }
    }

    /// Move to `next`, refusing edges the state machine does not have
    pub fn transition(&mut self, next: Status) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            log::info!(
                "{} {}: {} -> {}",
                self.kind,
                self.identity
                    .as_ref()
                    .map_or_else(|| "(new)".to_string(), ToString::to_string),
                self.status,
                next
            );
        }
        self.status = next;
        Ok(())
    }

    /// Recorded value of an attribute, treating JSON null as unset
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.recorded.get(attribute).filter(|v| !v.is_null())
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A structured message returned to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            attribute: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            attribute: None,
            message: message.into(),
        }
    }

    /// Scope the diagnostic to an attribute
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let diagnostic = Self::error(err.to_string());
        match err.attribute() {
            Some(attribute) => diagnostic.with_attribute(attribute),
            None => diagnostic,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attribute) => write!(f, "{}: {} ({attribute})", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Check if any entry has error severity
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Entries with error severity
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Error)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of running the lifecycle controller for one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Recorded state already matched the declaration
    NoChange,
    /// Object was created and read back
    Created,
    /// Changed attributes were sent to the remote service
    Updated,
    /// Object was destroyed and recreated under a new identity
    Replaced,
    /// Object was deleted
    Deleted,
    /// Object was imported and read
    Imported,
    /// Read-reconcile cycle ran against an existing object
    Refreshed,
    /// Read found the object removed out-of-band
    Vanished,
    /// Remote side effect happened but recorded state is incomplete
    Incomplete { reason: String },
    /// Apply failed
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Incomplete { .. })
    }

    /// Check if the result represents a remote change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated | Self::Replaced | Self::Deleted | Self::Incomplete { .. }
        )
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub imported: usize,
    pub refreshed: usize,
    pub vanished: usize,
    pub incomplete: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of remote changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.incomplete == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.total_changes()
            + self.imported
            + self.refreshed
            + self.vanished
            + self.incomplete
            + self.failed
            + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Updated => self.updated += 1,
            ApplyResult::Replaced => self.replaced += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Imported => self.imported += 1,
            ApplyResult::Refreshed => self.refreshed += 1,
            ApplyResult::Vanished => self.vanished += 1,
            ApplyResult::Incomplete { .. } => self.incomplete += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }
}
