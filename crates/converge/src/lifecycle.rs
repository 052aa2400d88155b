//! Lifecycle controller
//!
//! Sequences calls to the [`ApiClient`] for one instance and runs the
//! reconciler after every remote read:
//!
//! ```text
//! Absent -> Creating -> Active -> (Active | Updating -> Active)* -> Deleting -> Gone
//! ```
//!
//! Entry points never return raw errors. Every outcome carries the object
//! to record, an [`ApplyResult`] and the diagnostics raised on the way.
//! [`Controller::lookup`] is the exception: it records nothing and hands
//! back the observed attributes or the error.
//!
//! After a create or update, the caller's declared values are merged over
//! the recorded state before reconciling, so preserve-class attributes keep
//! what the caller wrote rather than the service's normalization of it.

use crate::client::{ApiClient, request_body};
use crate::diff::{AttributeChange, validate_declaration};
use crate::error::{Error, RemoteError, Result};
use crate::import::resolve_with;
use crate::planner::{Action, plan_instance};
use crate::reconcile::{ForceRefresh, Reconciled, reconcile_object};
use crate::registry::registry;
use crate::schema::KindSchema;
use crate::types::{
    ApplyResult, Attributes, Diagnostic, Diagnostics, Identity, ManagedObject, Operation, Status,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order of the two halves of a replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceOrder {
    #[default]
    DestroyBeforeCreate,
    CreateBeforeDestroy,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub replace_order: ReplaceOrder,
    /// Applied to read-reconcile cycles only
    pub force_refresh: ForceRefresh,
}

/// What one controller call produced
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Object to record; status `Absent` or `Gone` means nothing remains
    pub object: ManagedObject,
    pub result: ApplyResult,
    pub diagnostics: Diagnostics,
}

impl ApplyOutcome {
    fn new(object: ManagedObject, result: ApplyResult) -> Self {
        Self {
            object,
            result,
            diagnostics: Diagnostics::new(),
        }
    }

    fn failed(object: ManagedObject, err: &Error) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::from(err));
        Self {
            object,
            result: ApplyResult::Failed {
                error: err.to_string(),
            },
            diagnostics,
        }
    }

    fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.object.identity()
    }

    /// Check if the outcome represents success
    pub fn is_success(&self) -> bool {
        self.result.is_success() && !self.diagnostics.has_errors()
    }
}

/// Why an instance is being deleted
///
/// A replaced instance is still declared, so finding it already gone is an
/// error rather than the goal reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Undeclared,
    Replaced,
}

/// Drives instances through their lifecycle against one [`ApiClient`]
pub struct Controller<'a> {
    client: &'a dyn ApiClient,
    options: ControllerOptions,
}

/// Registered kind that declarations may manage
fn managed(kind: &str) -> Result<&'static KindSchema> {
    let schema = registry().require(kind)?;
    if schema.is_read_only() {
        return Err(Error::ReadOnlyKind(kind.to_string()));
    }
    Ok(schema)
}

fn identity_of(object: &ManagedObject) -> Result<Identity> {
    object
        .identity()
        .cloned()
        .ok_or_else(|| Error::MissingIdentity {
            kind: object.kind.clone(),
            status: object.status(),
        })
}

/// `base` with every set value of `top` laid over it
fn overlay(base: &Attributes, top: &Attributes) -> Attributes {
    let mut merged = base.clone();
    for (name, value) in top {
        if !value.is_null() {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Prior for reconciling right after a write: declared values win
fn written(kind: &KindSchema, recorded: &Attributes, declared: &Attributes) -> Attributes {
    let settable: Attributes = declared
        .iter()
        .filter(|(name, _)| kind.get(name).is_some_and(|s| s.mutability.caller_may_set()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    overlay(recorded, &settable)
}

impl<'a> Controller<'a> {
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self::with_options(client, ControllerOptions::default())
    }

    pub fn with_options(client: &'a dyn ApiClient, options: ControllerOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Converge one instance towards its declaration
    ///
    /// `declared` is `None` once the caller removed the declaration, which
    /// destroys the instance. `prior` is the object recorded by the previous
    /// call, if any. Invalid declarations are rejected before any remote call.
    pub fn apply(
        &self,
        kind: &str,
        declared: Option<&Attributes>,
        prior: Option<&ManagedObject>,
    ) -> ApplyOutcome {
        let fallback = || prior.cloned().unwrap_or_else(|| ManagedObject::absent(kind));
        let schema = match managed(kind) {
            Ok(schema) => schema,
            Err(e) => return ApplyOutcome::failed(fallback(), &e),
        };

        let Some(declared) = declared else {
            return match prior {
                Some(prior) if prior.status().exists_remotely() => {
                    self.destroy_with(schema, prior, Removal::Undeclared)
                }
                _ => ApplyOutcome::new(fallback(), ApplyResult::NoChange),
            };
        };

        let diagnostics = validate_declaration(schema, declared);
        if diagnostics.has_errors() {
            let count = diagnostics.errors().count();
            return ApplyOutcome::new(
                fallback(),
                ApplyResult::Failed {
                    error: format!("declaration has {count} error(s)"),
                },
            )
            .with_diagnostics(diagnostics);
        }

        let action = match plan_instance(schema, Some(declared), prior) {
            Ok(action) => action,
            Err(e) => return ApplyOutcome::failed(fallback(), &e),
        };
        log::debug!("{kind}: {}", action.label());

        let outcome = match (action, prior) {
            (Action::NoOp, _) => ApplyOutcome::new(fallback(), ApplyResult::NoChange),
            (Action::Finish, Some(prior)) => self.finish(schema, prior, ApplyResult::Created),
            (Action::Update { changes }, Some(prior)) => {
                self.update(schema, prior, declared, &changes)
            }
            (Action::Replace { .. } | Action::Delete, Some(prior)) => {
                self.replace(schema, prior, declared)
            }
            (_, _) => self.create(schema, declared),
        };
        outcome.with_diagnostics(diagnostics)
    }

    /// Read-reconcile cycle for a recorded instance
    ///
    /// A not-found read means the object was removed out-of-band: the
    /// outcome is [`ApplyResult::Vanished`] with a fresh `Absent` object.
    pub fn refresh(&self, object: &ManagedObject) -> ApplyOutcome {
        let schema = match registry().require(&object.kind) {
            Ok(schema) => schema,
            Err(e) => return ApplyOutcome::failed(object.clone(), &e),
        };
        match object.status() {
            Status::Absent | Status::Gone => ApplyOutcome::new(object.clone(), ApplyResult::NoChange),
            Status::Creating => self.finish(schema, object, ApplyResult::Refreshed),
            Status::Deleting => {
                let mut outcome = ApplyOutcome::new(object.clone(), ApplyResult::NoChange);
                outcome.diagnostics.push(Diagnostic::warning(format!(
                    "{} is being deleted; apply again to finish",
                    object.kind
                )));
                outcome
            }
            Status::Active | Status::Updating => {
                match self.try_refresh(schema, object) {
                    Ok(outcome) => outcome,
                    Err(e) => ApplyOutcome::failed(object.clone(), &e),
                }
            }
        }
    }

    fn try_refresh(&self, kind: &KindSchema, object: &ManagedObject) -> Result<ApplyOutcome> {
        let identity = identity_of(object)?;
        let observed = match self.read(kind, &identity) {
            Ok(observed) => observed,
            Err(e) if e.is_not_found() => return Ok(self.vanished(kind, &identity)),
            Err(e) => return Err(e),
        };

        let reconciled = reconcile_object(
            kind,
            &object.recorded,
            None,
            &observed,
            &self.options.force_refresh,
        )?;
        let mut next = object.clone();
        next.recorded = reconciled.recorded;
        next.transition(Status::Active)?;
        Ok(ApplyOutcome::new(next, ApplyResult::Refreshed).with_diagnostics(reconciled.diagnostics))
    }

    /// Destroy a recorded instance
    pub fn destroy(&self, object: &ManagedObject) -> ApplyOutcome {
        match managed(&object.kind) {
            Ok(schema) => self.destroy_with(schema, object, Removal::Undeclared),
            Err(e) => ApplyOutcome::failed(object.clone(), &e),
        }
    }

    /// Adopt an existing remote object by import token
    ///
    /// Nothing is recorded beforehand, so every preserve-class attribute
    /// adopts what the service returns.
    pub fn import_instance(&self, kind: &str, token: &str) -> ApplyOutcome {
        let absent = || ManagedObject::absent(kind);
        let schema = match managed(kind) {
            Ok(schema) => schema,
            Err(e) => return ApplyOutcome::failed(absent(), &e),
        };
        match self.try_import(schema, token) {
            Ok(outcome) => outcome,
            Err(e) => ApplyOutcome::failed(absent(), &e),
        }
    }

    fn try_import(&self, kind: &KindSchema, token: &str) -> Result<ApplyOutcome> {
        let identity = resolve_with(token, kind)?;
        let mut object = ManagedObject::imported(kind.name, identity.clone());
        let observed = self.read(kind, &identity)?;
        let reconciled = reconcile_object(
            kind,
            &Attributes::new(),
            None,
            &observed,
            &self.options.force_refresh,
        )?;
        object.recorded = reconciled.recorded;
        object.transition(Status::Active)?;
        Ok(ApplyOutcome::new(object, ApplyResult::Imported).with_diagnostics(reconciled.diagnostics))
    }

    /// Read one remote object by import token without managing it
    ///
    /// Only attributes the kind declares are returned, sensitive ones
    /// redacted. Works for every kind, including read-only ones.
    pub fn lookup(&self, kind: &str, token: &str) -> Result<Attributes> {
        let schema = registry().require(kind)?;
        let identity = resolve_with(token, schema)?;
        let observed = self.read(schema, &identity)?;
        let known: Attributes = observed
            .into_iter()
            .filter(|(name, value)| !value.is_null() && schema.get(name).is_some())
            .collect();
        log::debug!("looked up {kind} {token}: {} attribute(s)", known.len());
        Ok(schema.redact(&known))
    }

    fn read(&self, kind: &KindSchema, identity: &Identity) -> Result<Attributes> {
        log::debug!("read {} {identity}", kind.name);
        self.client
            .read(kind, identity)
            .map_err(|e| Error::remote(Operation::Read, kind.name, e))
    }

    fn vanished(&self, kind: &KindSchema, identity: &Identity) -> ApplyOutcome {
        let token = kind.token(identity);
        log::warn!("{} {token} no longer exists remotely", kind.name);
        let mut outcome = ApplyOutcome::new(ManagedObject::absent(kind.name), ApplyResult::Vanished);
        outcome.diagnostics.push(Diagnostic::warning(format!(
            "{} {token} was removed outside of this tool",
            kind.name
        )));
        outcome
    }

    fn reconcile_after_write(
        kind: &KindSchema,
        prior: &Attributes,
        declared: &Attributes,
        observed: &Attributes,
    ) -> Result<Reconciled> {
        reconcile_object(kind, prior, Some(declared), observed, &ForceRefresh::new())
    }

    fn create(&self, kind: &KindSchema, declared: &Attributes) -> ApplyOutcome {
        match self.try_create(kind, declared) {
            Ok(outcome) => outcome,
            Err(e) => ApplyOutcome::failed(ManagedObject::absent(kind.name), &e),
        }
    }

    fn try_create(&self, kind: &KindSchema, declared: &Attributes) -> Result<ApplyOutcome> {
        let body = request_body(kind, declared)?;
        let mut object = ManagedObject::absent(kind.name);
        object.transition(Status::Creating)?;

        log::debug!("create {}", kind.name);
        let created = self
            .client
            .create(kind, &body)
            .map_err(|e| Error::remote(Operation::Create, kind.name, e))?;
        object.assign_identity(created.identity.clone())?;

        // Recorded even if the read below fails, so a retry only reads
        let prior = written(kind, &Attributes::new(), declared);
        let partial = Self::reconcile_after_write(kind, &prior, declared, &created.observed)?;
        object.recorded = overlay(&partial.recorded, &prior);

        match self.read(kind, &created.identity) {
            Ok(observed) => {
                let observed = overlay(&created.observed, &observed);
                let reconciled = Self::reconcile_after_write(kind, &object.recorded, declared, &observed)?;
                object.recorded = reconciled.recorded;
                object.transition(Status::Active)?;
                Ok(ApplyOutcome::new(object, ApplyResult::Created)
                    .with_diagnostics(reconciled.diagnostics))
            }
            Err(e) => Ok(Self::orphaned(kind, object, &e)),
        }
    }

    /// Create succeeded but the follow-up read did not
    fn orphaned(kind: &KindSchema, object: ManagedObject, err: &Error) -> ApplyOutcome {
        let identity = object
            .identity()
            .map_or_else(String::new, |identity| kind.token(identity));
        log::warn!("{} {identity} created but not read back: {err}", object.kind);
        let reason = format!("created {identity} but reading it back failed; apply again to finish");
        let mut outcome = ApplyOutcome::new(
            object,
            ApplyResult::Incomplete {
                reason: reason.clone(),
            },
        );
        outcome.diagnostics.push(Diagnostic::error(format!("{reason}: {err}")));
        outcome
    }

    /// Complete a create whose read never landed
    fn finish(&self, kind: &KindSchema, object: &ManagedObject, result: ApplyResult) -> ApplyOutcome {
        let attempt = || -> Result<ApplyOutcome> {
            let identity = identity_of(object)?;
            let observed = match self.read(kind, &identity) {
                Ok(observed) => observed,
                Err(e) if e.is_not_found() => return Ok(self.vanished(kind, &identity)),
                Err(e) => return Err(e),
            };
            let reconciled = reconcile_object(
                kind,
                &object.recorded,
                None,
                &observed,
                &ForceRefresh::new(),
            )?;
            let mut next = object.clone();
            next.recorded = reconciled.recorded;
            next.transition(Status::Active)?;
            Ok(ApplyOutcome::new(next, result).with_diagnostics(reconciled.diagnostics))
        };
        attempt().unwrap_or_else(|e| ApplyOutcome::failed(object.clone(), &e))
    }

    fn update(
        &self,
        kind: &KindSchema,
        prior: &ManagedObject,
        declared: &Attributes,
        changes: &[AttributeChange],
    ) -> ApplyOutcome {
        self.try_update(kind, prior, declared, changes)
            .unwrap_or_else(|e| ApplyOutcome::failed(prior.clone(), &e))
    }

    fn try_update(
        &self,
        kind: &KindSchema,
        prior: &ManagedObject,
        declared: &Attributes,
        changes: &[AttributeChange],
    ) -> Result<ApplyOutcome> {
        let identity = identity_of(prior)?;
        let after: Attributes = changes
            .iter()
            .filter_map(|c| c.after.as_ref().map(|v| (c.attribute.clone(), v.clone())))
            .collect();
        let mut body = request_body(kind, &after)?;
        for change in changes.iter().filter(|c| c.is_removal()) {
            body.insert(change.attribute.clone(), Value::Null);
        }

        let mut object = prior.clone();
        if object.status() != Status::Updating {
            object.transition(Status::Updating)?;
        }

        log::debug!("update {} {identity}: {} attribute(s)", kind.name, body.len());
        let returned = self
            .client
            .update(kind, &identity, &body)
            .map_err(|e| Error::remote(Operation::Update, kind.name, e))?;

        let mut recorded = written(kind, &object.recorded, declared);
        for change in changes.iter().filter(|c| c.is_removal()) {
            recorded.remove(&change.attribute);
        }

        let (observed, degraded) = match self.read(kind, &identity) {
            Ok(observed) => (overlay(&returned, &observed), None),
            Err(e) => (returned, Some(e)),
        };
        let reconciled = Self::reconcile_after_write(kind, &recorded, declared, &observed)?;
        object.recorded = reconciled.recorded;
        object.transition(Status::Active)?;

        let outcome = match degraded {
            None => ApplyOutcome::new(object, ApplyResult::Updated),
            Some(e) => {
                let token = kind.token(&identity);
                log::warn!("{} {token} updated but not read back: {e}", kind.name);
                let reason = format!("updated {token} but reading it back failed");
                let mut outcome = ApplyOutcome::new(
                    object,
                    ApplyResult::Incomplete {
                        reason: reason.clone(),
                    },
                );
                outcome.diagnostics.push(Diagnostic::error(format!("{reason}: {e}")));
                outcome
            }
        };
        Ok(outcome.with_diagnostics(reconciled.diagnostics))
    }

    fn destroy_with(&self, kind: &KindSchema, object: &ManagedObject, removal: Removal) -> ApplyOutcome {
        self.try_destroy(kind, object, removal)
            .unwrap_or_else(|e| ApplyOutcome::failed(object.clone(), &e))
    }

    fn try_destroy(
        &self,
        kind: &KindSchema,
        object: &ManagedObject,
        removal: Removal,
    ) -> Result<ApplyOutcome> {
        let mut current = match object.status() {
            Status::Absent | Status::Gone => {
                return Ok(ApplyOutcome::new(object.clone(), ApplyResult::NoChange));
            }
            // Only an Active object may be deleted; read the orphan first
            Status::Creating => {
                let finished = self.finish(kind, object, ApplyResult::Refreshed);
                if finished.object.status() != Status::Active {
                    return Ok(finished);
                }
                finished.object
            }
            Status::Active | Status::Updating | Status::Deleting => object.clone(),
        };
        let identity = identity_of(&current)?;

        match current.status() {
            Status::Deleting => {}
            Status::Updating => {
                current.transition(Status::Active)?;
                current.transition(Status::Deleting)?;
            }
            _ => current.transition(Status::Deleting)?,
        }

        log::debug!("delete {} {identity}", kind.name);
        match self.client.delete(kind, &identity) {
            Ok(()) => {}
            Err(RemoteError::NotFound) if removal == Removal::Undeclared => {
                log::warn!("{} {identity} was already gone", kind.name);
            }
            Err(e) => return Err(Error::remote(Operation::Delete, kind.name, e)),
        }
        current.transition(Status::Gone)?;
        Ok(ApplyOutcome::new(current, ApplyResult::Deleted))
    }

    /// Recreate an instance under a new identity
    fn replace(&self, kind: &KindSchema, prior: &ManagedObject, declared: &Attributes) -> ApplyOutcome {
        match self.options.replace_order {
            ReplaceOrder::DestroyBeforeCreate => {
                let destroyed = self.destroy_with(kind, prior, Removal::Replaced);
                if !destroyed.result.is_success() {
                    return destroyed;
                }
                let created = self.create(kind, declared);
                Self::replaced(created, destroyed.diagnostics)
            }
            ReplaceOrder::CreateBeforeDestroy => {
                let created = self.create(kind, declared);
                if matches!(created.result, ApplyResult::Failed { .. }) {
                    return ApplyOutcome {
                        object: prior.clone(),
                        ..created
                    };
                }
                let destroyed = self.destroy_with(kind, prior, Removal::Replaced);
                if destroyed.result.is_success() {
                    return Self::replaced(created, destroyed.diagnostics);
                }
                let old = prior
                    .identity()
                    .map_or_else(String::new, |identity| kind.token(identity));
                let reason = format!("replacement created but {} {old} was not deleted", kind.name);
                let mut outcome = ApplyOutcome::new(
                    created.object,
                    ApplyResult::Incomplete {
                        reason: reason.clone(),
                    },
                )
                .with_diagnostics(created.diagnostics)
                .with_diagnostics(destroyed.diagnostics);
                outcome.diagnostics.push(Diagnostic::error(reason));
                outcome
            }
        }
    }

    fn replaced(created: ApplyOutcome, earlier: Diagnostics) -> ApplyOutcome {
        let result = match created.result {
            ApplyResult::Created => ApplyResult::Replaced,
            other => other,
        };
        let mut diagnostics = earlier;
        diagnostics.extend(created.diagnostics);
        ApplyOutcome {
            object: created.object,
            result,
            diagnostics,
        }
    }
}
