//! Capability interface of the remote compute service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::ExportJob;

/// Remote task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Active tasks block resubmission of the same id.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// Handle to a submitted remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    /// Service-assigned task name, used for cancellation.
    pub name: String,
    /// Caller-chosen description (the export job id).
    pub description: String,
    pub state: TaskState,
    pub created: Option<DateTime<Utc>>,
}

/// Remote export capability.
///
/// `list_active` is keyed by task description.
#[async_trait]
pub trait ComputeService: Send + Sync {
    async fn list_active(&self) -> Result<HashMap<String, TaskHandle>>;

    async fn submit(&self, job: &ExportJob) -> Result<TaskHandle>;

    async fn cancel(&self, task: &TaskHandle) -> Result<()>;
}
