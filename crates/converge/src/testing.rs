//! In-memory remote service for tests
//!
//! Behaves like the gateway admin API where it matters to reconciliation:
//! - workspace slugs come back as UUIDs
//! - slugs are lower-cased
//! - documents come back structured, keys sorted, `is_enabled: true` dropped
//! - ids, status and timestamps are server-assigned
//! - write-only attributes are never returned; retained ones only on create

use crate::client::{ApiClient, Created};
use crate::error::{RemoteError, RemoteResult};
use crate::schema::{KindSchema, Mutability};
use crate::types::{Attributes, Identity, Operation};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Attributes>,
    workspaces: BTreeMap<String, String>,
    failures: Vec<(Operation, RemoteError)>,
    calls: Vec<Operation>,
    next_id: usize,
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

fn key(kind: &str, identity: &Identity) -> String {
    format!("{kind}/{}", identity.id)
}

fn is_uuid(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `operation` call fail with `error`
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.inner.lock().unwrap().failures.push((operation, error));
    }

    /// Delete an object behind the engine's back
    pub fn remove_out_of_band(&self, kind: &str, identity: &Identity) {
        self.inner.lock().unwrap().objects.remove(&key(kind, identity));
    }

    /// Store an object the engine never created
    pub fn insert(&self, kind: &str, identity: &Identity, attributes: Attributes) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key(kind, identity), attributes);
    }

    /// Overwrite a stored attribute behind the engine's back
    pub fn set_remote(&self, kind: &str, identity: &Identity, attribute: &str, value: Value) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(object) = inner.objects.get_mut(&key(kind, identity)) {
            object.insert(attribute.to_string(), value);
        }
    }

    pub fn stored(&self, kind: &str, identity: &Identity) -> Option<Attributes> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&key(kind, identity))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// UUID the service uses for a workspace slug
    pub fn workspace_uuid(&self, slug: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        Self::uuid_for(&mut inner, slug)
    }

    fn uuid_for(inner: &mut Inner, slug: &str) -> String {
        if is_uuid(slug) {
            return slug.to_string();
        }
        let next = inner.workspaces.len() + 1;
        inner
            .workspaces
            .entry(slug.to_string())
            .or_insert_with(|| format!("00000000-0000-4000-8000-{next:012}"))
            .clone()
    }

    fn begin(inner: &mut Inner, operation: Operation) -> RemoteResult<()> {
        inner.calls.push(operation);
        if let Some(pos) = inner.failures.iter().position(|(op, _)| *op == operation) {
            return Err(inner.failures.remove(pos).1);
        }
        Ok(())
    }

    fn normalize(inner: &mut Inner, name: &str, value: &Value) -> Value {
        match (name, value) {
            ("workspace_id", Value::String(slug)) => Value::String(Self::uuid_for(inner, slug)),
            ("slug", Value::String(slug)) => Value::String(slug.to_lowercase()),
            ("checks", Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| {
                        let mut item = item.clone();
                        if let Value::Object(map) = &mut item
                            && map.get("is_enabled") == Some(&Value::Bool(true))
                        {
                            map.remove("is_enabled");
                        }
                        item
                    })
                    .collect(),
            ),
            // serde_json maps come back with sorted keys
            _ => value.clone(),
        }
    }

    /// What a read returns for a stored object
    fn view(kind: &KindSchema, stored: &Attributes) -> Attributes {
        stored
            .iter()
            .filter(|(name, _)| {
                kind.get(name)
                    .is_some_and(|s| !s.write_only && !s.retain_when_absent)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl ApiClient for MemoryRemote {
    fn create(&self, kind: &KindSchema, declared: &Attributes) -> RemoteResult<Created> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin(&mut inner, Operation::Create)?;
        inner.next_id += 1;
        let n = inner.next_id;

        let mut stored = Attributes::new();
        for (name, value) in declared {
            let value = Self::normalize(&mut inner, name, value);
            stored.insert(name.clone(), value);
        }
        for spec in kind.attributes() {
            let server_assigned =
                spec.mutability == Mutability::Computed || spec.name == kind.identity.id;
            if !server_assigned || stored.contains_key(spec.name) {
                continue;
            }
            let value = match spec.name {
                "id" => json!(format!("{}-{n}", kind.name)),
                "slug" => json!(format!("{}-{n:04x}", kind.name.replace('_', "-"))),
                "status" => json!("active"),
                "created_at" | "updated_at" => json!("2026-01-01T00:00:00Z"),
                "key" => json!(format!("pk-{n:08}")),
                _ => continue,
            };
            stored.insert(spec.name.to_string(), value);
        }

        let id = stored
            .get(kind.identity.id)
            .and_then(Value::as_str)
            .map_or_else(|| format!("{}-{n}", kind.name), str::to_string);
        let identity = match kind.identity.parent {
            Some(parent) => {
                let parent = declared
                    .get(parent)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Identity::scoped(parent, id)
            }
            None => Identity::new(id),
        };

        // Everything but write-only values in the create response
        let observed = stored
            .iter()
            .filter(|(name, _)| kind.get(name).is_some_and(|s| !s.write_only))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        inner.objects.insert(key(kind.name, &identity), stored);
        Ok(Created { identity, observed })
    }

    fn read(&self, kind: &KindSchema, identity: &Identity) -> RemoteResult<Attributes> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin(&mut inner, Operation::Read)?;
        inner
            .objects
            .get(&key(kind.name, identity))
            .map(|stored| Self::view(kind, stored))
            .ok_or(RemoteError::NotFound)
    }

    fn update(
        &self,
        kind: &KindSchema,
        identity: &Identity,
        changed: &Attributes,
    ) -> RemoteResult<Attributes> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin(&mut inner, Operation::Update)?;
        let mut normalized = Attributes::new();
        for (name, value) in changed {
            let value = Self::normalize(&mut inner, name, value);
            normalized.insert(name.clone(), value);
        }
        let stored = inner
            .objects
            .get_mut(&key(kind.name, identity))
            .ok_or(RemoteError::NotFound)?;
        for (name, value) in normalized {
            if value.is_null() {
                stored.remove(&name);
            } else {
                stored.insert(name, value);
            }
        }
        stored.insert("updated_at".into(), json!("2026-02-01T00:00:00Z"));
        Ok(Self::view(kind, stored))
    }

    fn delete(&self, kind: &KindSchema, identity: &Identity) -> RemoteResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin(&mut inner, Operation::Delete)?;
        inner
            .objects
            .remove(&key(kind.name, identity))
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}
