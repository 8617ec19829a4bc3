//! Progress reporting for the map, reduce and load phases.
//!
//! Jobs report through [`ProgressCallback`] so they stay independent of how
//! (or whether) progress is drawn. The CLI supplies `indicatif` bars.

use std::sync::Arc;

/// Receives progress from a long-running phase.
///
/// Implementations must be `Send + Sync` because reduce partitions run on
/// blocking tasks.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance by `delta` units.
    fn inc(&self, delta: u64);

    /// Replace the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the phase as finished.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
