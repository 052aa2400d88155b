//! The reconciler: decides which value to record for every attribute
//!
//! Inputs per attribute are the prior recorded value, the caller's declared
//! value and the value the remote service just returned. The mutability
//! class alone picks the winner:
//!
//! | class | prior unset | prior set |
//! |---|---|---|
//! | computed | observed | observed |
//! | required-replace, computed-preserve | observed | prior (json: prior if canonically equal, else observed) |
//! | required-updatable, optional-updatable | observed | observed |
//!
//! JSON null counts as unset on every side.

use crate::canonical;
use crate::error::Result;
use crate::schema::{AttributeSpec, KindSchema, Mutability};
use crate::types::{Attributes, Diagnostic, Diagnostics};
use serde_json::Value;
use std::collections::BTreeSet;

/// `kind.attribute` pairs whose preserve rule is bypassed on read
///
/// A listed attribute adopts the observed value even when a prior exists,
/// so a legitimate out-of-band change becomes visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceRefresh(BTreeSet<(String, String)>);

impl ForceRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<String>, attribute: impl Into<String>) {
        self.0.insert((kind.into(), attribute.into()));
    }

    pub fn contains(&self, kind: &str, attribute: &str) -> bool {
        self.0
            .iter()
            .any(|(k, a)| k == kind && a == attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, a)| (k.as_str(), a.as_str()))
    }
}

/// Outcome of reconciling one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    /// State to record
    pub recorded: Attributes,
    /// Warnings raised while reconciling
    pub diagnostics: Diagnostics,
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Value to record for a single attribute
///
/// `declared` is only inspected for well-formedness: a malformed opaque-json
/// declaration fails with `MalformedDocument`. Returns `None` when the
/// attribute should be left unset.
pub fn reconcile(
    spec: &AttributeSpec,
    prior: Option<&Value>,
    declared: Option<&Value>,
    observed: Option<&Value>,
) -> Result<Option<Value>> {
    if spec.is_document()
        && let Some(declared) = present(declared)
    {
        canonical::document_of(spec.name, declared)?;
    }
    Ok(decide(spec, present(prior), present(observed), false))
}

fn decide(
    spec: &AttributeSpec,
    prior: Option<&Value>,
    observed: Option<&Value>,
    force_refresh: bool,
) -> Option<Value> {
    let Some(observed) = observed else {
        // Never echoed back: the service not returning it says nothing
        if spec.write_only || spec.retain_when_absent {
            return prior.cloned();
        }
        return match spec.mutability {
            Mutability::RequiredReplace | Mutability::ComputedPreserve if !force_refresh => {
                prior.cloned()
            }
            _ => None,
        };
    };

    match spec.mutability {
        Mutability::Computed | Mutability::RequiredUpdatable | Mutability::OptionalUpdatable => {
            Some(adopt(spec, observed))
        }
        Mutability::RequiredReplace | Mutability::ComputedPreserve => match prior {
            None => Some(adopt(spec, observed)),
            Some(_) if force_refresh => Some(adopt(spec, observed)),
            Some(prior) if spec.is_document() => {
                if documents_equal(spec, prior, observed) {
                    Some(prior.clone())
                } else {
                    log::debug!("{}: document changed remotely, adopting observed", spec.name);
                    Some(adopt(spec, observed))
                }
            }
            Some(prior) => {
                if prior != observed {
                    log::debug!(
                        "{}: keeping recorded value over observed {}",
                        spec.name,
                        if spec.sensitive { "(sensitive)".to_string() } else { observed.to_string() }
                    );
                }
                Some(prior.clone())
            }
        },
    }
}

/// Observed value in recorded form; documents are stored as text
fn adopt(spec: &AttributeSpec, observed: &Value) -> Value {
    if spec.is_document() {
        Value::String(canonical::document_text(observed))
    } else {
        observed.clone()
    }
}

/// Canonical comparison where an unparseable side means "not equal"
fn documents_equal(spec: &AttributeSpec, prior: &Value, observed: &Value) -> bool {
    match canonical::equal_values(spec.name, prior, observed, &spec.elision) {
        Ok(equal) => equal,
        Err(e) => {
            log::warn!("{e}; treating the remote value as authoritative");
            false
        }
    }
}

/// Reconcile every attribute of `kind`
///
/// Attributes the service returns that the kind does not declare are
/// dropped. Attributes listed in `force_refresh` skip the preserve rule; a
/// warning is recorded whenever that discards a differing prior.
pub fn reconcile_object(
    kind: &KindSchema,
    prior: &Attributes,
    declared: Option<&Attributes>,
    observed: &Attributes,
    force_refresh: &ForceRefresh,
) -> Result<Reconciled> {
    let mut out = Reconciled::default();

    for name in observed.keys() {
        if kind.get(name).is_none() {
            log::debug!("{}: ignoring undeclared observed attribute {name}", kind.name);
        }
    }

    for spec in kind.attributes() {
        let prior_value = present(prior.get(spec.name));
        let declared_value = declared.and_then(|d| d.get(spec.name));
        let observed_value = present(observed.get(spec.name));

        if spec.is_document()
            && let Some(declared_value) = present(declared_value)
        {
            canonical::document_of(spec.name, declared_value)?;
        }

        let forced = spec.mutability.preserves_prior() && force_refresh.contains(kind.name, spec.name);
        let value = decide(spec, prior_value, observed_value, forced);

        if forced
            && let Some(prior_value) = prior_value
            && value.as_ref() != Some(prior_value)
        {
            out.diagnostics.push(
                Diagnostic::warning(format!(
                    "{}: recorded value replaced by the remote value (force refresh)",
                    kind.name
                ))
                .with_attribute(spec.name),
            );
        }

        if let Some(value) = value {
            out.recorded.insert(spec.name.to_string(), value);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::registry::registry;
    use serde_json::json;

    fn spec(kind: &str, attribute: &str) -> &'static AttributeSpec {
        registry().require(kind).unwrap().get(attribute).unwrap()
    }

    #[test]
    fn test_scalar_preserve_keeps_prior() {
        let workspace_id = spec("guardrail", "workspace_id");
        let prior = json!("ws-my-workspace-abc123");
        let observed = json!("550e8400-e29b-41d4-a716-446655440000");
        let value = reconcile(workspace_id, Some(&prior), Some(&prior), Some(&observed)).unwrap();
        assert_eq!(value, Some(prior));
    }

    #[test]
    fn test_fresh_import_adopts_observed() {
        let name = spec("provider", "slug");
        let observed = json!("OpenAI");
        let value = reconcile(name, None, None, Some(&observed)).unwrap();
        assert_eq!(value, Some(observed));
    }

    #[test]
    fn test_null_prior_counts_as_unset() {
        let slug = spec("integration", "slug");
        let observed = json!("openai-prod");
        let value = reconcile(slug, Some(&Value::Null), None, Some(&observed)).unwrap();
        assert_eq!(value, Some(observed));
    }

    #[test]
    fn test_computed_always_adopts() {
        let status = spec("guardrail", "status");
        let prior = json!("inactive");
        let observed = json!("active");
        assert_eq!(
            reconcile(status, Some(&prior), None, Some(&observed)).unwrap(),
            Some(observed)
        );
        assert_eq!(reconcile(status, Some(&prior), None, None).unwrap(), None);
    }

    #[test]
    fn test_updatable_adopts_observed() {
        let name = spec("workspace", "name");
        let prior = json!("Prod");
        let observed = json!("prod");
        assert_eq!(
            reconcile(name, Some(&prior), Some(&prior), Some(&observed)).unwrap(),
            Some(observed)
        );
    }

    #[test]
    fn test_json_reordering_keeps_prior_text() {
        let config = spec("config", "config");
        let prior = json!(r#"{"retry":{"attempts":3},"cache":{"mode":"simple"}}"#);
        let observed = json!({"cache": {"mode": "simple"}, "retry": {"attempts": 3}});
        let value = reconcile(config, Some(&prior), Some(&prior), Some(&observed)).unwrap();
        assert_eq!(value, Some(prior));
    }

    #[test]
    fn test_json_real_change_adopts_observed() {
        let config = spec("config", "config");
        let prior = json!(r#"{"retry":{"attempts":3}}"#);
        let observed = json!(r#"{"retry":{"attempts":5}}"#);
        let value = reconcile(config, Some(&prior), Some(&prior), Some(&observed)).unwrap();
        assert_eq!(value, Some(observed));
    }

    #[test]
    fn test_json_structured_observation_is_stored_as_text() {
        let config = spec("config", "config");
        let observed = json!({"retry": {"attempts": 3}});
        let value = reconcile(config, None, None, Some(&observed)).unwrap();
        assert_eq!(value, Some(json!(r#"{"retry":{"attempts":3}}"#)));
    }

    #[test]
    fn test_checks_enabled_default_is_not_drift() {
        let checks = spec("guardrail", "checks");
        let prior = json!(r#"[{"id":"x","is_enabled":true}]"#);
        let observed = json!([{"id": "x"}]);
        assert_eq!(
            reconcile(checks, Some(&prior), Some(&prior), Some(&observed)).unwrap(),
            Some(prior)
        );

        let disabled = json!(r#"[{"id":"x","is_enabled":false}]"#);
        assert_eq!(
            reconcile(checks, Some(&disabled), Some(&disabled), Some(&observed)).unwrap(),
            Some(json!(r#"[{"id":"x"}]"#))
        );
    }

    #[test]
    fn test_idempotent_under_normalization() {
        let config = spec("config", "config");
        let prior = json!(r#"{"b": 1, "a": [1, 2]}"#);
        let observed = json!({"a": [1.0, 2.0], "b": 1});
        let once = reconcile(config, Some(&prior), Some(&prior), Some(&observed)).unwrap();
        let twice = reconcile(config, once.as_ref(), Some(&prior), Some(&observed)).unwrap();
        assert_eq!(once, Some(prior.clone()));
        assert_eq!(twice, Some(prior));
    }

    #[test]
    fn test_malformed_declaration_is_rejected() {
        let checks = spec("guardrail", "checks");
        let declared = json!("[{\"id\":");
        let err = reconcile(checks, None, Some(&declared), Some(&json!([]))).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { ref attribute, .. } if attribute == "checks"));
    }

    #[test]
    fn test_malformed_prior_yields_to_observed() {
        let config = spec("config", "config");
        let prior = json!("{not json");
        let observed = json!({"a": 1});
        let value = reconcile(config, Some(&prior), None, Some(&observed)).unwrap();
        assert_eq!(value, Some(json!(r#"{"a":1}"#)));
    }

    #[test]
    fn test_write_only_keeps_prior_when_not_returned() {
        let key = spec("integration", "key");
        let prior = json!("sk-secret");
        assert_eq!(reconcile(key, Some(&prior), None, None).unwrap(), Some(prior));
    }

    #[test]
    fn test_key_returned_once_is_retained() {
        let key = spec("api_key", "key");
        let first = json!("pk-abc");
        let recorded = reconcile(key, None, None, Some(&first)).unwrap();
        assert_eq!(recorded, Some(first.clone()));
        assert_eq!(reconcile(key, recorded.as_ref(), None, None).unwrap(), Some(first));
    }

    #[test]
    fn test_reconcile_object_drops_unknown_and_keeps_order() {
        let kind = registry().require("workspace").unwrap();
        let observed: Attributes = [
            ("id".to_string(), json!("ws-1")),
            ("name".to_string(), json!("prod")),
            ("etag".to_string(), json!("x")),
        ]
        .into_iter()
        .collect();
        let out = reconcile_object(kind, &Attributes::new(), None, &observed, &ForceRefresh::new())
            .unwrap();
        assert_eq!(out.recorded.len(), 2);
        assert!(!out.recorded.contains_key("etag"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_force_refresh_adopts_and_warns() {
        let kind = registry().require("guardrail").unwrap();
        let prior: Attributes = [("workspace_id".to_string(), json!("ws-slug"))]
            .into_iter()
            .collect();
        let observed: Attributes = [("workspace_id".to_string(), json!("uuid-1"))]
            .into_iter()
            .collect();

        let mut force = ForceRefresh::new();
        force.insert("guardrail", "workspace_id");
        let out = reconcile_object(kind, &prior, None, &observed, &force).unwrap();
        assert_eq!(out.recorded["workspace_id"], json!("uuid-1"));
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(
            out.diagnostics.iter().next().unwrap().attribute.as_deref(),
            Some("workspace_id")
        );

        let out = reconcile_object(kind, &prior, None, &observed, &ForceRefresh::new()).unwrap();
        assert_eq!(out.recorded["workspace_id"], json!("ws-slug"));
        assert!(out.diagnostics.is_empty());
    }
}
