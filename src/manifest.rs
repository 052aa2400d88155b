//! Manifest of declared objects
//!
//! ```toml
//! [[object]]
//! kind = "guardrail"
//! name = "pii"
//!
//! [object.attributes]
//! name = "PII redaction"
//! workspace_id = "ws-prod"
//! checks = '[{"id": "default.pii"}]'
//! actions = { onFail = "block", deny = true }
//! ```
//!
//! Opaque-json attributes may be written as JSON text or as native TOML
//! values; both reach the engine unchanged.

use anyhow::{Context, Result, bail};
use converge::{Attributes, Diagnostics, registry, validate_declaration};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "object")]
    pub objects: Vec<ObjectDecl>,
}

/// One declared object
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDecl {
    pub kind: String,
    /// Local name, unique per kind
    pub name: String,
    #[serde(default)]
    pub attributes: toml::Table,
}

impl ObjectDecl {
    /// `kind.name`
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }

    /// Declared attributes in engine form
    pub fn declared(&self) -> Attributes {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect()
    }
}

/// Convert a TOML value to JSON; datetimes become strings
fn to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.check_structure()?;
        Ok(manifest)
    }

    /// Kinds must exist and be manageable, and addresses must be unique
    fn check_structure(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for object in &self.objects {
            if object.name.is_empty() || object.name.contains('.') {
                bail!(
                    "Invalid object name '{}': must be non-empty and contain no '.'",
                    object.name
                );
            }
            let kind = registry()
                .require(&object.kind)
                .with_context(|| format!("Object '{}'", object.address()))?;
            if kind.is_read_only() {
                bail!(
                    "Object '{}': {} is read-only and cannot be declared",
                    object.address(),
                    kind.name
                );
            }
            if !seen.insert(object.address()) {
                bail!("Duplicate object '{}'", object.address());
            }
        }
        Ok(())
    }

    pub fn find(&self, address: &str) -> Option<&ObjectDecl> {
        self.objects.iter().find(|o| o.address() == address)
    }

    /// Validate every declaration, keyed by address
    pub fn validate(&self) -> Vec<(String, Diagnostics)> {
        self.objects
            .iter()
            .filter_map(|object| {
                let schema = registry().get(&object.kind)?;
                let diagnostics = validate_declaration(schema, &object.declared());
                (!diagnostics.is_empty()).then(|| (object.address(), diagnostics))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
[[object]]
kind = "workspace"
name = "prod"
attributes = { name = "Production" }

[[object]]
kind = "guardrail"
name = "pii"

[object.attributes]
name = "PII redaction"
workspace_id = "ws-prod"
checks = '[{"id": "default.pii", "is_enabled": true}]'
actions = { onFail = "block", deny = true }
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.objects.len(), 2);
        let guardrail = manifest.find("guardrail.pii").unwrap();
        let declared = guardrail.declared();
        assert_eq!(declared["checks"], json!(r#"[{"id": "default.pii", "is_enabled": true}]"#));
        assert_eq!(declared["actions"], json!({"onFail": "block", "deny": true}));
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        let err = Manifest::parse("[[object]]\nkind = \"routing\"\nname = \"a\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown object kind: routing"));
    }

    #[test]
    fn test_read_only_kind_cannot_be_declared() {
        let text = "[[object]]\nkind = \"user\"\nname = \"ada\"\n";
        let err = Manifest::parse(text).unwrap_err();
        assert!(err.to_string().contains("user is read-only"));
    }

    #[test]
    fn test_duplicate_address() {
        let text = "[[object]]\nkind = \"workspace\"\nname = \"a\"\n[[object]]\nkind = \"workspace\"\nname = \"a\"\n";
        let err = Manifest::parse(text).unwrap_err();
        assert!(err.to_string().contains("Duplicate object 'workspace.a'"));
    }

    #[test]
    fn test_validation_reports_missing_required() {
        let text = "[[object]]\nkind = \"guardrail\"\nname = \"a\"\nattributes = { name = \"x\" }\n";
        let manifest = Manifest::parse(text).unwrap();
        let problems = manifest.validate();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, "guardrail.a");
        assert!(problems[0].1.has_errors());
    }

    #[test]
    fn test_datetime_becomes_string() {
        let value: toml::Value = toml::from_str::<toml::Table>("at = 2026-01-01T00:00:00Z")
            .unwrap()
            .remove("at")
            .unwrap();
        assert_eq!(to_json(&value), json!("2026-01-01T00:00:00Z"));
    }
}
