//! Planner - decides the action each declared or recorded instance needs

use crate::diff::{AttributeChange, compute_changes};
use crate::error::Result;
use crate::schema::KindSchema;
use crate::types::{Attributes, ManagedObject, Status};
use serde::Serialize;

/// What the lifecycle controller will do for one instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Recorded state matches the declaration
    NoOp,
    /// No identity yet
    Create,
    /// A previous create never got its read; read before anything else
    Finish,
    /// Send the changed attributes in place
    Update { changes: Vec<AttributeChange> },
    /// A replace-forcing attribute changed; `reasons` lists those
    Replace {
        reasons: Vec<AttributeChange>,
        changes: Vec<AttributeChange>,
    },
    /// Declaration was removed
    Delete,
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Finish => "finish",
            Self::Update { .. } => "update",
            Self::Replace { .. } => "replace",
            Self::Delete => "delete",
        }
    }
}

/// Decide the action for one instance
///
/// `declared` is `None` when the caller no longer declares the instance;
/// `recorded` is `None` when nothing was ever recorded for it.
pub fn plan_instance(
    kind: &KindSchema,
    declared: Option<&Attributes>,
    recorded: Option<&ManagedObject>,
) -> Result<Action> {
    let status = recorded.map_or(Status::Absent, ManagedObject::status);

    let Some(declared) = declared else {
        return Ok(if status.exists_remotely() {
            Action::Delete
        } else {
            Action::NoOp
        });
    };

    let recorded = match (status, recorded) {
        (Status::Absent | Status::Gone, _) | (_, None) => return Ok(Action::Create),
        (Status::Creating, _) => return Ok(Action::Finish),
        (Status::Deleting, _) => return Ok(Action::Delete),
        (Status::Active | Status::Updating, Some(object)) => object,
    };

    let changes = compute_changes(kind, &recorded.recorded, declared)?;
    if changes.is_empty() {
        return Ok(Action::NoOp);
    }

    let reasons: Vec<_> = changes
        .iter()
        .filter(|c| c.forces_replacement)
        .cloned()
        .collect();
    if reasons.is_empty() {
        Ok(Action::Update { changes })
    } else {
        Ok(Action::Replace { reasons, changes })
    }
}

/// One entry of a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChange {
    /// `kind.name`
    pub address: String,
    pub kind: String,
    #[serde(flatten)]
    pub action: Action,
}

/// An ordered set of planned actions
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub entries: Vec<PlannedChange>,
}

impl Plan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, address: impl Into<String>, kind: impl Into<String>, action: Action) {
        self.entries.push(PlannedChange {
            address: address.into(),
            kind: kind.into(),
            action,
        });
    }

    /// Filter plan to only include entries matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            entries: self.entries.into_iter().filter(|e| predicate(e)).collect(),
        }
    }

    /// Filter plan to only include entries matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|e| matches_filter(e, kind, name))
            }
        }
    }

    /// Entries that change something
    pub fn changes(&self) -> impl Iterator<Item = &PlannedChange> {
        self.entries.iter().filter(|e| !e.action.is_noop())
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_plan(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub finish: usize,
    pub unchanged: usize,
}

impl PlanSummary {
    pub fn from_plan(plan: &Plan) -> Self {
        let mut summary = Self::default();
        for entry in &plan.entries {
            match entry.action {
                Action::NoOp => summary.unchanged += 1,
                Action::Create => summary.create += 1,
                Action::Finish => summary.finish += 1,
                Action::Update { .. } => summary.update += 1,
                Action::Replace { .. } => summary.replace += 1,
                Action::Delete => summary.delete += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.create + self.update + self.replace + self.delete + self.finish
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Parse a target string like "kind.name" into (kind, name)
fn parse_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('.') {
        Some((kind, name)) => (kind, Some(name)),
        None => (target, None),
    }
}

fn matches_filter(entry: &PlannedChange, kind: &str, name: Option<&str>) -> bool {
    if entry.kind != kind {
        return false;
    }
    match name {
        Some(n) => entry.address == format!("{kind}.{n}"),
        None => true,
    }
}
