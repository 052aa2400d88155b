//! Execution engine - runs independent instances in parallel
//!
//! Each instance's steps stay strictly sequential inside the lifecycle
//! controller; only distinct instances overlap. The engine holds no locks
//! across instances.

use crate::context::ProgressCallback;
use crate::error::Result;
use crate::lifecycle::{ApplyOutcome, Controller};
use crate::types::{Attributes, ExecuteSummary, ManagedObject};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Options for batch execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of instances processed at once
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// One unit of work for [`apply_all`]
#[derive(Debug, Clone)]
pub struct Instance {
    /// Caller-chosen address, e.g. `guardrail.pii`
    pub address: String,
    pub kind: String,
    /// `None` destroys the instance
    pub declared: Option<Attributes>,
    pub prior: Option<ManagedObject>,
}

/// Outcomes in input order, plus their summary
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(String, ApplyOutcome)>,
    pub summary: ExecuteSummary,
}

/// Apply every instance
pub fn apply_all<P: ProgressCallback>(
    controller: &Controller<'_>,
    instances: &[Instance],
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<BatchReport> {
    run(
        instances,
        opts.jobs,
        |i| (i.address.as_str(), i.kind.as_str()),
        |i| controller.apply(&i.kind, i.declared.as_ref(), i.prior.as_ref()),
        progress,
    )
}

/// Run the read-reconcile cycle for every recorded object
pub fn refresh_all<P: ProgressCallback>(
    controller: &Controller<'_>,
    objects: &[(String, ManagedObject)],
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<BatchReport> {
    run(
        objects,
        opts.jobs,
        |(address, object)| (address.as_str(), object.kind.as_str()),
        |(_, object)| controller.refresh(object),
        progress,
    )
}

fn run<T, L, F, P>(
    items: &[T],
    jobs: usize,
    label: L,
    work: F,
    progress: &mut P,
) -> Result<BatchReport>
where
    T: Sync,
    L: Fn(&T) -> (&str, &str),
    F: Fn(&T) -> ApplyOutcome + Sync,
    P: ProgressCallback,
{
    let mut report = BatchReport::default();
    if items.is_empty() {
        return Ok(report);
    }

    progress.on_batch_start(items.len());
    let outcomes = if jobs <= 1 || items.len() == 1 {
        // Sequential execution
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let (address, kind) = label(item);
            progress.on_instance_start(address, kind);
            let outcome = work(item);
            progress.on_instance_complete(address, &outcome.result);
            outcomes.push(outcome);
        }
        outcomes
    } else {
        let outcomes = run_parallel(items, jobs, &work)?;
        for (item, outcome) in items.iter().zip(&outcomes) {
            progress.on_instance_complete(label(item).0, &outcome.result);
        }
        outcomes
    };
    progress.on_batch_complete();

    for (item, outcome) in items.iter().zip(outcomes) {
        report.summary.add_result(&outcome.result);
        report.outcomes.push((label(item).0.to_string(), outcome));
    }
    Ok(report)
}

/// Execute items in parallel using rayon, returning outcomes in input order
fn run_parallel<T, F>(items: &[T], jobs: usize, work: &F) -> Result<Vec<ApplyOutcome>>
where
    T: Sync,
    F: Fn(&T) -> ApplyOutcome + Sync,
{
    let results: Arc<Mutex<Vec<(usize, ApplyOutcome)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(items.len())));

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    pool.install(|| {
        items.par_iter().enumerate().for_each(|(index, item)| {
            let outcome = work(item);
            results
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((index, outcome));
        });
    });

    let mut results = std::mem::take(
        &mut *results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner),
    );
    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, outcome)| outcome).collect())
}
