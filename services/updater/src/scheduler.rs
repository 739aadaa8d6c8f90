use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::connector::{CycleReport, ResourceClient};
use crate::reconciler::Reconciler;
use repotrack_db::repos::repositories::TrackedRepoStore;

/// Runs reconciliation cycles back to back, `interval` apart, until cancelled.
///
/// A cycle is always awaited before the next sleep starts, so cycles never overlap even
/// when one overruns the interval.
pub struct Scheduler<C, S> {
    reconciler: Reconciler<C, S>,
    interval: Duration,
}

impl<C, S> Scheduler<C, S>
where
    C: ResourceClient,
    S: TrackedRepoStore,
{
    pub fn new(reconciler: Reconciler<C, S>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    pub async fn run(&mut self, cancel: &CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler started");

        while !cancel.is_cancelled() {
            self.run_once().await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("scheduler stopped");
    }

    /// Run exactly one cycle and report its outcome. Errors and panics are logged, never
    /// propagated.
    pub async fn run_once(&mut self) -> Option<CycleReport> {
        let outcome = AssertUnwindSafe(self.reconciler.run_cycle())
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(report)) => {
                tracing::info!(
                    source = %report.source,
                    listed = report.listed,
                    upserted = report.upserted(),
                    inserted = report.inserted,
                    updated = report.updated,
                    conflicts = report.conflicts,
                    watermark = ?report.watermark,
                    "reconciliation cycle completed"
                );
                Some(report)
            }
            Ok(Err(e)) if e.is_cycle_fatal() => {
                tracing::warn!(error = %e, "reconciliation cycle aborted, retrying next tick");
                None
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "reconciliation cycle failed");
                None
            }
            Err(panic) => {
                tracing::error!(panic = %panic_message(&*panic), "reconciliation cycle panicked");
                None
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
