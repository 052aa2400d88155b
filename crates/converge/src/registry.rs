//! Static registry of object kinds
//!
//! Built once on first use and read-only afterwards. All per-kind behavior
//! lives in these tables; the reconciler and lifecycle controller never
//! branch on a kind's name.

use crate::error::{Error, Result};
use crate::schema::{AttributeSpec, KindSchema, Mutability};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::builtin);

/// The built-in registry
pub fn registry() -> &'static Registry {
    &BUILTIN
}

/// Mutability class of `kind.attribute` in the built-in registry
///
/// # Panics
///
/// Panics if the kind or attribute is not registered.
pub fn classify(kind: &str, attribute: &str) -> Mutability {
    match registry().get(kind) {
        Some(schema) => schema.classify(attribute),
        None => panic!("unknown object kind: {kind}"),
    }
}

/// Mapping from kind name to schema
#[derive(Debug, Default)]
pub struct Registry {
    kinds: BTreeMap<&'static str, KindSchema>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind, replacing any previous schema with the same name
    pub fn register(&mut self, kind: KindSchema) {
        self.kinds.insert(kind.name, kind);
    }

    pub fn get(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.get(name)
    }

    /// Look up a kind, failing with `UnknownKind`
    pub fn require(&self, name: &str) -> Result<&KindSchema> {
        self.get(name)
            .ok_or_else(|| Error::UnknownKind(name.to_string()))
    }

    /// All kinds, sorted by name
    pub fn kinds(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Registry with every kind the gateway admin API exposes
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in [
            workspace(),
            workspace_member(),
            user_invite(),
            guardrail(),
            config(),
            integration(),
            provider(),
            api_key(),
            prompt(),
            rate_limits_policy(),
            usage_limits_policy(),
            user(),
        ] {
            registry.register(kind);
        }
        registry
    }
}

fn timestamps(kind: KindSchema) -> KindSchema {
    kind.attribute(AttributeSpec::computed("created_at"))
        .attribute(AttributeSpec::computed("updated_at"))
}

fn workspace() -> KindSchema {
    let kind = KindSchema::new("workspace", "id")
        .describe("Isolated environment grouping users, keys and policies")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::optional("description"));
    timestamps(kind)
}

fn workspace_member() -> KindSchema {
    KindSchema::scoped("workspace_member", "workspace_id", "id", '/')
        .describe("A user's membership and role inside a workspace")
        .attribute(AttributeSpec::computed("id"))
        .attribute(
            AttributeSpec::required_replace("workspace_id")
                .describe("Workspace slug or UUID; the service reports the UUID"),
        )
        .attribute(AttributeSpec::required_replace("user_id"))
        .attribute(AttributeSpec::required("role"))
        .attribute(AttributeSpec::computed("created_at"))
}

fn user() -> KindSchema {
    let kind = KindSchema::new("user", "id")
        .describe("An organisation user; looked up by id, never managed")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::computed("email"))
        .attribute(AttributeSpec::computed("role"))
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}

fn user_invite() -> KindSchema {
    // Invites cannot be edited, every caller-set field recreates
    KindSchema::new("user_invite", "id")
        .describe("Pending invitation of a user into the organisation")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::required_replace("email"))
        .attribute(AttributeSpec::required_replace("role"))
        .attribute(
            AttributeSpec::preserved("workspaces")
                .json()
                .replaces()
                .describe("Workspace grants as a JSON list of {id, role}"),
        )
        .attribute(AttributeSpec::preserved("scopes").replaces())
        .attribute(AttributeSpec::computed("status"))
        .attribute(AttributeSpec::computed("created_at"))
        .attribute(AttributeSpec::computed("expires_at"))
}

fn guardrail() -> KindSchema {
    let kind = KindSchema::new("guardrail", "slug")
        .describe("Content-safety checks and the actions taken on their verdicts")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::computed("slug"))
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::required_replace("workspace_id"))
        .attribute(
            AttributeSpec::preserved("checks")
                .json()
                .mandatory()
                .elide("[].is_enabled", json!(true))
                .describe("JSON list of checks; omitted is_enabled means enabled"),
        )
        .attribute(
            AttributeSpec::preserved("actions")
                .json()
                .mandatory()
                .describe("JSON object with onFail/onSuccess behavior"),
        )
        .attribute(AttributeSpec::computed("status"))
        .attribute(AttributeSpec::computed("version_id"));
    timestamps(kind)
}

fn config() -> KindSchema {
    let kind = KindSchema::new("config", "slug")
        .describe("Routing configuration: retries, caching, fallbacks and targets")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::computed("slug"))
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::preserved("config").json().mandatory())
        .attribute(
            AttributeSpec::preserved("workspace_id")
                .replaces()
                .describe("Required with organisation-level admin keys"),
        )
        .attribute(AttributeSpec::preserved("is_default"))
        .attribute(AttributeSpec::computed("status"))
        .attribute(AttributeSpec::computed("version_id"));
    timestamps(kind)
}

fn integration() -> KindSchema {
    let kind = KindSchema::new("integration", "slug")
        .describe("Organisation-level credentials for an AI provider")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::preserved("slug").replaces())
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::required_replace("ai_provider_id"))
        .attribute(
            AttributeSpec::optional("key")
                .write_only()
                .sensitive()
                .describe("Provider API key; never returned by the service"),
        )
        .attribute(AttributeSpec::optional("description"))
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}

fn provider() -> KindSchema {
    KindSchema::scoped("provider", "workspace_id", "id", ':')
        .describe("Workspace-scoped provider backed by an integration")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::preserved("slug").replaces())
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::required_replace("workspace_id"))
        .attribute(AttributeSpec::required_replace("integration_id"))
        .attribute(AttributeSpec::computed("ai_provider_id"))
        .attribute(AttributeSpec::optional("note"))
        .attribute(AttributeSpec::computed("status"))
        .attribute(AttributeSpec::computed("created_at"))
}

fn api_key() -> KindSchema {
    let kind = KindSchema::new("api_key", "id")
        .describe("Organisation or workspace API key")
        .attribute(AttributeSpec::computed("id"))
        .attribute(
            AttributeSpec::computed("key")
                .sensitive()
                .retained()
                .describe("Secret value; only returned when the key is created"),
        )
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::required_replace("type"))
        .attribute(AttributeSpec::required_replace("sub_type"))
        .attribute(AttributeSpec::preserved("workspace_id").replaces())
        .attribute(AttributeSpec::optional("description"))
        .attribute(AttributeSpec::optional("scopes"))
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}

fn prompt() -> KindSchema {
    let kind = KindSchema::new("prompt", "slug")
        .describe("Versioned prompt template")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::computed("slug"))
        .attribute(AttributeSpec::required("name"))
        .attribute(AttributeSpec::required_replace("collection_id"))
        .attribute(AttributeSpec::required("template"))
        .attribute(AttributeSpec::required("model"))
        .attribute(
            AttributeSpec::required("virtual_key")
                .write_only()
                .describe("Provider reference; not echoed back by the service"),
        )
        .attribute(AttributeSpec::preserved("parameters").json())
        .attribute(AttributeSpec::optional("version_description").write_only())
        .attribute(AttributeSpec::computed("prompt_version"))
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}

fn rate_limits_policy() -> KindSchema {
    let kind = KindSchema::new("rate_limits_policy", "id")
        .describe("Request or token rate limit applied to matching traffic")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::optional("name"))
        .attribute(AttributeSpec::required_replace("workspace_id"))
        .attribute(AttributeSpec::required_replace("conditions").json())
        .attribute(AttributeSpec::required_replace("group_by").json())
        .attribute(AttributeSpec::required_replace("type"))
        .attribute(AttributeSpec::required_replace("unit"))
        .attribute(AttributeSpec::required("value"))
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}

fn usage_limits_policy() -> KindSchema {
    let kind = KindSchema::new("usage_limits_policy", "id")
        .describe("Spend or token budget applied to matching traffic")
        .attribute(AttributeSpec::computed("id"))
        .attribute(AttributeSpec::optional("name"))
        .attribute(AttributeSpec::required_replace("workspace_id"))
        .attribute(AttributeSpec::required_replace("conditions").json())
        .attribute(AttributeSpec::required_replace("group_by").json())
        .attribute(AttributeSpec::required_replace("type"))
        .attribute(AttributeSpec::required("credit_limit"))
        .attribute(AttributeSpec::optional("alert_threshold"))
        .attribute(AttributeSpec::preserved("periodic_reset").replaces())
        .attribute(AttributeSpec::computed("status"));
    timestamps(kind)
}
