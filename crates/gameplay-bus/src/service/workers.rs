//! # Cooperative Drain Workers
//!
//! `process_async` spawns tokio tasks that share the bus and run dispatch
//! steps until every bucket is empty, yielding between steps. Completion is
//! observable through [`DrainHandle`].

use super::bus::EventBus;
use super::dispatcher::{dispatch_next, StepOutcome};
use crate::error::BusError;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Outcome counts of one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: u32,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
}

/// Aggregate of all workers of one `process_async` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub workers: Vec<WorkerReport>,
}

impl DrainReport {
    #[must_use]
    pub fn total_processed(&self) -> u64 {
        self.workers.iter().map(|w| w.processed).sum()
    }

    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.failed).sum()
    }
}

/// Completion handle for a set of drain workers.
#[derive(Debug)]
pub struct DrainHandle {
    tasks: Vec<JoinHandle<WorkerReport>>,
}

impl DrainHandle {
    /// Number of workers started.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// True once every worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Wait for every worker.
    ///
    /// # Errors
    ///
    /// `WorkerFailed` if a worker panicked (a handler panic) or was cancelled.
    pub async fn join(self) -> Result<DrainReport, BusError> {
        let mut workers = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            let report = task
                .await
                .map_err(|e| BusError::WorkerFailed(e.to_string()))?;
            workers.push(report);
        }
        Ok(DrainReport { workers })
    }
}

async fn run_worker(bus: EventBus, worker: u32) -> WorkerReport {
    let mut report = WorkerReport {
        worker,
        ..WorkerReport::default()
    };
    loop {
        match dispatch_next(&bus.shared, None) {
            StepOutcome::Idle | StepOutcome::Discarded => break,
            StepOutcome::Processed => report.processed += 1,
            StepOutcome::Retried => report.retried += 1,
            StepOutcome::Failed | StepOutcome::Dropped | StepOutcome::DeadlineMissed => {
                report.failed += 1
            }
        }
        tokio::task::yield_now().await;
    }
    debug!(worker, processed = report.processed, "Drain worker finished");
    report
}

impl EventBus {
    /// Drain the queues on `worker_count` tokio tasks.
    ///
    /// A count of 0 uses the configured `worker_thread_count`.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `InvalidArgument`: both counts are 0
    /// - `NoAsyncRuntime`: not called from within a tokio runtime
    pub fn process_async(&self, worker_count: u32) -> Result<DrainHandle, BusError> {
        let configured = self
            .shared
            .with_state(|state| state.config.worker_thread_count)?;
        let workers = if worker_count == 0 {
            configured
        } else {
            worker_count
        };
        if workers == 0 {
            return Err(BusError::InvalidArgument(
                "worker count is 0 and no worker_thread_count is configured".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| BusError::NoAsyncRuntime)?;

        let tasks = (0..workers)
            .map(|worker| runtime.spawn(run_worker(self.clone(), worker)))
            .collect();
        info!(workers, "Started async drain");
        Ok(DrainHandle { tasks })
    }
}
