//! Progress reporting for batch execution
//!
//! Lets the executor report without depending on a specific UI.

use crate::types::ApplyResult;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch of instances
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting a single instance
    ///
    /// Only sequential runs report starts; parallel runs report completions
    /// once the batch has finished.
    fn on_instance_start(&mut self, address: &str, kind: &str);

    /// Called when an instance completes
    fn on_instance_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_instance_start(&mut self, _address: &str, _kind: &str) {}
    fn on_instance_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Progress callback that logs through the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, count: usize) {
        log::info!("processing {count} instance(s)");
    }

    fn on_instance_start(&mut self, address: &str, kind: &str) {
        log::debug!("{address} ({kind})");
    }

    fn on_instance_complete(&mut self, address: &str, result: &ApplyResult) {
        match result {
            ApplyResult::Failed { error } => log::error!("{address}: {error}"),
            ApplyResult::Incomplete { reason } => log::warn!("{address}: {reason}"),
            other => log::info!("{address}: {other:?}"),
        }
    }

    fn on_batch_complete(&mut self) {}
}
