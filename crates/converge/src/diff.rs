//! Change detection between recorded state and a declaration

use crate::canonical;
use crate::error::{Error, Result};
use crate::schema::{AttributeSpec, KindSchema, Mutability};
use crate::types::{Attributes, Diagnostic, Diagnostics};
use serde::Serialize;
use serde_json::Value;

/// A single attribute whose declared value differs from the recorded one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    /// Attribute name
    pub attribute: String,
    /// Recorded value, if any
    pub before: Option<Value>,
    /// Declared value; `None` clears the attribute
    pub after: Option<Value>,
    /// Whether the change recreates the object
    pub forces_replacement: bool,
    /// Whether values must be redacted when displayed
    pub sensitive: bool,
    /// Whether values are JSON documents
    pub document: bool,
}

impl AttributeChange {
    fn new(spec: &AttributeSpec, before: Option<&Value>, after: Option<&Value>) -> Self {
        Self {
            attribute: spec.name.to_string(),
            before: before.cloned(),
            after: after.cloned(),
            forces_replacement: spec.forces_replacement(),
            sensitive: spec.sensitive,
            document: spec.is_document(),
        }
    }

    /// Check if this change sets a previously unset attribute
    pub fn is_addition(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    /// Check if this change clears the attribute
    pub fn is_removal(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Semantic equality of a declared and a recorded value
///
/// Documents compare in canonical form under the attribute's elision rules;
/// scalars compare as canonical JSON so `3` and `3.0` match. A malformed
/// recorded document never equals anything.
pub fn same_value(spec: &AttributeSpec, declared: &Value, recorded: &Value) -> Result<bool> {
    if !spec.is_document() {
        return Ok(canonical::equal(declared, recorded, &[]));
    }
    let declared = canonical::document_of(spec.name, declared)?;
    match canonical::document_of(spec.name, recorded) {
        Ok(recorded) => Ok(canonical::equal(&declared, &recorded, &spec.elision)),
        Err(e) => {
            log::warn!("recorded {e}");
            Ok(false)
        }
    }
}

/// Attribute changes needed to bring `recorded` to `declared`
///
/// Only caller-settable attributes are compared. An optional-updatable
/// attribute the caller stopped declaring is cleared; preserve-class
/// attributes left undeclared keep whatever the service holds.
pub fn compute_changes(
    kind: &KindSchema,
    recorded: &Attributes,
    declared: &Attributes,
) -> Result<Vec<AttributeChange>> {
    let mut changes = Vec::new();

    for spec in kind.attributes() {
        if !spec.mutability.caller_may_set() {
            continue;
        }
        let before = present(recorded.get(spec.name));
        let after = present(declared.get(spec.name));

        match (before, after) {
            (None, None) => {}
            (Some(before), Some(after)) => {
                if !same_value(spec, after, before)? {
                    changes.push(AttributeChange::new(spec, Some(before), Some(after)));
                }
            }
            (None, Some(after)) => {
                if spec.is_document() {
                    canonical::document_of(spec.name, after)?;
                }
                changes.push(AttributeChange::new(spec, None, Some(after)));
            }
            (Some(before), None) => {
                if spec.mutability == Mutability::OptionalUpdatable && !spec.retain_when_absent {
                    changes.push(AttributeChange::new(spec, Some(before), None));
                }
            }
        }
    }

    Ok(changes)
}

/// Check a declaration against its kind before any remote call
///
/// Reports unknown attributes, values for computed attributes, missing
/// required attributes and malformed documents.
pub fn validate_declaration(kind: &KindSchema, declared: &Attributes) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let mut report = |err: Error| diagnostics.push(Diagnostic::from(&err));

    for name in declared.keys() {
        if kind.get(name).is_none() {
            report(Error::UnknownAttribute {
                kind: kind.name.to_string(),
                attribute: name.clone(),
            });
        }
    }

    for spec in kind.attributes() {
        let value = present(declared.get(spec.name));
        match value {
            None if spec.required => report(Error::InvalidDeclaration {
                attribute: spec.name.to_string(),
                reason: "a value is required".to_string(),
            }),
            None => {}
            Some(_) if !spec.mutability.caller_may_set() => {
                report(Error::InvalidDeclaration {
                    attribute: spec.name.to_string(),
                    reason: "computed by the service and cannot be set".to_string(),
                });
            }
            Some(value) if spec.is_document() => {
                if let Err(e) = canonical::document_of(spec.name, value) {
                    report(e);
                }
            }
            Some(Value::Object(_)) => report(Error::InvalidDeclaration {
                attribute: spec.name.to_string(),
                reason: "expected a scalar or a list, found a table".to_string(),
            }),
            Some(_) => {}
        }
    }

    diagnostics
}
