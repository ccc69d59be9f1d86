//! Idempotent export job submission.
//!
//! The submitter takes one snapshot of the active remote tasks and one
//! listing of the output folder at construction. Every decision in the run
//! is made against those snapshots:
//!
//! - overwrite: cancel an active task with the same id, then submit
//!   regardless of existing output.
//! - otherwise: skip if a task with the id is active, else skip if
//!   `{id}.{ext}` is already in the bucket, else submit.
//!
//! Submission is fire-and-forget. A successful submit is recorded in the
//! active snapshot so a repeated id in the same run is skipped.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use storage::{ObjectStorage, StoragePath};

use crate::error::Result;
use crate::job::{ExportJob, FileFormat};
use crate::service::{ComputeService, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A task with this id is pending or running.
    Active,
    /// The output file is already in the bucket.
    Exists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Active => write!(f, "task already submitted"),
            SkipReason::Exists => write!(f, "file already exists in bucket"),
        }
    }
}

/// Result of claiming an export id for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Skip(SkipReason),
    /// The id may be submitted. `cancelled` holds the task stopped to make room.
    Ready { cancelled: Option<TaskHandle> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(TaskHandle),
    Skipped(SkipReason),
}

/// Counters for the end-of-run log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub submitted: usize,
    pub cancelled: usize,
    pub skipped_active: usize,
    pub skipped_existing: usize,
}

pub struct JobSubmitter {
    service: Arc<dyn ComputeService>,
    active: HashMap<String, TaskHandle>,
    existing: BTreeSet<String>,
    format: FileFormat,
    overwrite: bool,
    summary: SubmitSummary,
}

impl JobSubmitter {
    /// Snapshot active tasks and the output folder listing.
    ///
    /// Either call failing aborts the run.
    pub async fn snapshot(
        service: Arc<dyn ComputeService>,
        bucket: &ObjectStorage,
        folder: &str,
        overwrite: bool,
    ) -> Result<Self> {
        let active = service.list_active().await?;
        debug!(tasks = active.len(), "Active remote tasks");

        info!(bucket = %bucket.bucket(), folder = %folder, "Getting bucket file list");
        let existing = bucket.list_names(folder).await?;

        Ok(Self::from_parts(service, active, existing, overwrite))
    }

    pub fn from_parts(
        service: Arc<dyn ComputeService>,
        active: HashMap<String, TaskHandle>,
        existing: BTreeSet<String>,
        overwrite: bool,
    ) -> Self {
        Self {
            service,
            active,
            existing,
            format: FileFormat::Csv,
            overwrite,
            summary: SubmitSummary::default(),
        }
    }

    pub fn is_active(&self, export_id: &str) -> bool {
        self.active.contains_key(export_id)
    }

    pub fn output_exists(&self, export_id: &str) -> bool {
        self.existing
            .contains(&StoragePath::export_name(export_id, self.format.extension()))
    }

    /// Decide whether `export_id` should be submitted, cancelling an active
    /// task first in overwrite mode.
    pub async fn claim(&mut self, export_id: &str) -> Result<Claim> {
        if self.overwrite {
            let cancelled = match self.active.remove(export_id) {
                Some(task) => {
                    info!(id = %export_id, task = %task.name, "Task already submitted, cancelling");
                    self.service.cancel(&task).await?;
                    self.summary.cancelled += 1;
                    Some(task)
                }
                None => None,
            };
            if self.output_exists(export_id) {
                info!(id = %export_id, "File already exists in bucket, overwriting");
            }
            return Ok(Claim::Ready { cancelled });
        }

        if self.is_active(export_id) {
            info!(id = %export_id, "Task already submitted, skipping");
            self.summary.skipped_active += 1;
            return Ok(Claim::Skip(SkipReason::Active));
        }
        if self.output_exists(export_id) {
            info!(id = %export_id, "File already exists in bucket, skipping");
            self.summary.skipped_existing += 1;
            return Ok(Claim::Skip(SkipReason::Exists));
        }

        Ok(Claim::Ready { cancelled: None })
    }

    /// Submit a job whose id has been claimed.
    pub async fn submit(&mut self, job: &ExportJob) -> Result<TaskHandle> {
        info!(id = %job.id(), "Starting export task");
        let task = self.service.submit(job).await?;
        self.active.insert(job.id().to_string(), task.clone());
        self.summary.submitted += 1;
        Ok(task)
    }

    /// Claim and submit in one step.
    pub async fn run(&mut self, job: &ExportJob) -> Result<SubmitOutcome> {
        match self.claim(job.id()).await? {
            Claim::Skip(reason) => Ok(SubmitOutcome::Skipped(reason)),
            Claim::Ready { .. } => Ok(SubmitOutcome::Submitted(self.submit(job).await?)),
        }
    }

    pub fn summary(&self) -> SubmitSummary {
        self.summary
    }
}
