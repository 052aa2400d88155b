//! Attribute classification for object kinds
//!
//! Every kind is an ordered list of [`AttributeSpec`]s. An attribute's
//! [`Mutability`] decides who is authoritative for the attribute during
//! reconciliation; [`ValueKind`] decides how two values are compared.

use crate::canonical::ElisionRule;
use crate::types::{Attributes, Identity};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Stand-in shown wherever a sensitive value would be displayed
pub const REDACTED: &str = "(sensitive)";

/// How an attribute may change and whose value wins on reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mutability {
    /// Caller must set it; changing it recreates the object
    RequiredReplace,
    /// Caller must set it; changes are sent as updates
    RequiredUpdatable,
    /// Caller may set it; changes are sent as updates
    OptionalUpdatable,
    /// Server-owned
    Computed,
    /// Caller may set it; the caller's value survives server normalization
    ComputedPreserve,
}

impl Mutability {
    /// Whether a caller declaration may carry this attribute
    pub fn caller_may_set(self) -> bool {
        !matches!(self, Self::Computed)
    }

    /// Whether a declaration must carry this attribute
    pub fn is_required(self) -> bool {
        matches!(self, Self::RequiredReplace | Self::RequiredUpdatable)
    }

    /// Whether reconciliation keeps the prior value over the observed one
    pub fn preserves_prior(self) -> bool {
        matches!(self, Self::RequiredReplace | Self::ComputedPreserve)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RequiredReplace => "required-replace",
            Self::RequiredUpdatable => "required-updatable",
            Self::OptionalUpdatable => "optional-updatable",
            Self::Computed => "computed",
            Self::ComputedPreserve => "computed-preserve",
        }
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How values of an attribute are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Compared by plain equality
    Scalar,
    /// JSON document text, compared in canonical form
    OpaqueJson,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => f.write_str("scalar"),
            Self::OpaqueJson => f.write_str("json"),
        }
    }
}

/// Static declaration of one attribute of a kind
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub mutability: Mutability,
    pub value_kind: ValueKind,
    /// Declarations must carry a value
    pub required: bool,
    /// Only consulted for opaque-json attributes
    pub elision: Vec<ElisionRule>,
    /// Optional attribute whose change recreates the object
    pub replace_on_change: bool,
    /// Remote service never returns this value
    pub write_only: bool,
    /// Remote service returns this value once, at creation
    pub retain_when_absent: bool,
    /// Redacted in plan output and logs
    pub sensitive: bool,
    pub description: &'static str,
}

impl AttributeSpec {
    fn new(name: &'static str, mutability: Mutability) -> Self {
        Self {
            name,
            mutability,
            value_kind: ValueKind::Scalar,
            required: mutability.is_required(),
            elision: Vec::new(),
            replace_on_change: false,
            write_only: false,
            retain_when_absent: false,
            sensitive: false,
            description: "",
        }
    }

    pub fn required_replace(name: &'static str) -> Self {
        Self::new(name, Mutability::RequiredReplace)
    }

    pub fn required(name: &'static str) -> Self {
        Self::new(name, Mutability::RequiredUpdatable)
    }

    pub fn optional(name: &'static str) -> Self {
        Self::new(name, Mutability::OptionalUpdatable)
    }

    pub fn computed(name: &'static str) -> Self {
        Self::new(name, Mutability::Computed)
    }

    pub fn preserved(name: &'static str) -> Self {
        Self::new(name, Mutability::ComputedPreserve)
    }

    /// Mark the attribute as holding an opaque JSON document
    pub fn json(mut self) -> Self {
        self.value_kind = ValueKind::OpaqueJson;
        self
    }

    /// Treat `value` at `path` inside the document as absent when comparing
    pub fn elide(mut self, path: &str, value: Value) -> Self {
        self.elision.push(ElisionRule::new(path, value));
        self
    }

    pub fn replaces(mut self) -> Self {
        self.replace_on_change = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Require a declaration for a preserve-class attribute
    pub fn mandatory(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn retained(mut self) -> Self {
        self.retain_when_absent = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Whether a changed declaration recreates the object
    pub fn forces_replacement(&self) -> bool {
        self.replace_on_change || self.mutability == Mutability::RequiredReplace
    }

    pub fn is_document(&self) -> bool {
        self.value_kind == ValueKind::OpaqueJson
    }

    /// Whether a changed declaration can be sent as an in-place update
    pub fn is_updatable(&self) -> bool {
        self.mutability.caller_may_set() && !self.forces_replacement()
    }
}

/// Shape of the token accepted by import for a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// The token is the identifier itself
    Single,
    /// `parent<separator>id`
    Scoped { separator: char },
}

impl ImportFormat {
    /// Human-readable description of the expected token shape
    pub fn expected(&self, identity: &IdentitySpec) -> String {
        match (self, identity.parent) {
            (Self::Scoped { separator }, Some(parent)) => {
                format!("{parent}{separator}{}", identity.id)
            }
            (Self::Scoped { separator }, None) => format!("parent{separator}{}", identity.id),
            (Self::Single, _) => identity.id.to_string(),
        }
    }
}

/// Which observed attributes carry the server identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySpec {
    pub id: &'static str,
    pub parent: Option<&'static str>,
}

/// A named schema: identity, import format and ordered attributes
#[derive(Debug, Clone, PartialEq)]
pub struct KindSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub identity: IdentitySpec,
    pub import: ImportFormat,
    attributes: Vec<AttributeSpec>,
}

impl KindSchema {
    /// Kind addressed by a single identifier attribute
    pub fn new(name: &'static str, id_attribute: &'static str) -> Self {
        Self {
            name,
            description: "",
            identity: IdentitySpec {
                id: id_attribute,
                parent: None,
            },
            import: ImportFormat::Single,
            attributes: Vec::new(),
        }
    }

    /// Kind addressed inside a parent, imported as `parent<separator>id`
    pub fn scoped(
        name: &'static str,
        parent_attribute: &'static str,
        id_attribute: &'static str,
        separator: char,
    ) -> Self {
        Self {
            name,
            description: "",
            identity: IdentitySpec {
                id: id_attribute,
                parent: Some(parent_attribute),
            },
            import: ImportFormat::Scoped { separator },
            attributes: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        debug_assert!(
            self.attributes.iter().all(|a| a.name != spec.name),
            "duplicate attribute {}.{}",
            self.name,
            spec.name
        );
        self.attributes.push(spec);
        self
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Look up an attribute spec by name
    pub fn get(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Mutability class of an attribute
    ///
    /// # Panics
    ///
    /// Asking for an attribute the kind does not declare is a programming
    /// error, not a recoverable condition.
    pub fn classify(&self, name: &str) -> Mutability {
        match self.get(name) {
            Some(spec) => spec.mutability,
            None => panic!("{} has no attribute `{name}`", self.name),
        }
    }

    /// Kind the caller can only look up, never declare
    pub fn is_read_only(&self) -> bool {
        self.attributes
            .iter()
            .all(|a| a.mutability == Mutability::Computed)
    }

    /// Copy of `attributes` with sensitive values replaced by [`REDACTED`]
    pub fn redact(&self, attributes: &Attributes) -> Attributes {
        attributes
            .iter()
            .map(|(name, value)| {
                let hidden = !value.is_null() && self.get(name).is_some_and(|s| s.sensitive);
                let value = if hidden {
                    Value::String(REDACTED.to_string())
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Import token that addresses `identity`
    pub fn token(&self, identity: &Identity) -> String {
        match (self.import, &identity.parent) {
            (ImportFormat::Scoped { separator }, Some(parent)) => {
                format!("{parent}{separator}{}", identity.id)
            }
            _ => identity.id.clone(),
        }
    }
}
