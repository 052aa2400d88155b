//! # Converge
//!
//! Reconciliation engine for configuration objects hosted by a remote
//! service.
//!
//! For every attribute of every managed object the engine decides whether
//! to keep the caller's recorded value or adopt what the service returned,
//! so that the service's own normalization (slug to UUID, case folding,
//! JSON key order, omitted defaults) never shows up as drift.
//!
//! ## Core Concepts
//!
//! - **Kind**: a named schema of attributes, see [`registry()`]
//! - **Mutability**: who is authoritative for an attribute, see [`Mutability`]
//! - **Reconciler**: picks the value to record, see [`reconcile()`]
//! - **Controller**: sequences create/read/update/delete, see [`Controller`]
//! - **Executor**: runs independent instances in parallel, see [`apply_all`]
//!
//! ## Example
//!
//! ```ignore
//! use converge::{Attributes, Controller, ApplyResult};
//! use serde_json::json;
//!
//! let client = MyHttpClient::new(api_key);
//! let controller = Controller::new(&client);
//!
//! let declared: Attributes = [("name".to_string(), json!("production"))].into();
//! let outcome = controller.apply("workspace", Some(&declared), None);
//! assert_eq!(outcome.result, ApplyResult::Created);
//!
//! // Persist outcome.object; hand it back as `prior` next time
//! let again = controller.apply("workspace", Some(&declared), Some(&outcome.object));
//! assert_eq!(again.result, ApplyResult::NoChange);
//! ```
//!
//! ## Provider Traits
//!
//! - [`ApiClient`]: performs the remote request/response exchange
//! - [`ProgressCallback`]: receives progress updates from the executor

pub mod canonical;
pub mod client;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod import;
pub mod lifecycle;
pub mod planner;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod types;

#[cfg(test)]
pub mod testing;

// Re-export main types at crate root
pub use canonical::{CanonicalForm, ElisionRule, canonicalize, equal};
pub use client::{ApiClient, Created};
pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use diff::{AttributeChange, compute_changes, validate_declaration};
pub use error::{Error, RemoteError, RemoteResult, Result};
pub use executor::{BatchReport, ExecuteOptions, Instance, apply_all, refresh_all};
pub use import::resolve;
pub use lifecycle::{ApplyOutcome, Controller, ControllerOptions, ReplaceOrder};
pub use planner::{Action, Plan, PlanSummary, PlannedChange, plan_instance};
pub use reconcile::{ForceRefresh, Reconciled, reconcile, reconcile_object};
pub use registry::{Registry, classify, registry};
pub use schema::{AttributeSpec, ImportFormat, KindSchema, Mutability, REDACTED, ValueKind};
pub use types::{
    ApplyResult, Attributes, Diagnostic, Diagnostics, ExecuteSummary, Identity, ManagedObject,
    Operation, Severity, Status,
};
