//! In-memory compute service for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{ComputeError, Result};
use crate::job::{
    Destination, ExportJob, FeatureSource, FileFormat, ImageLayer, ImageSpec, OutputProperty,
    Projection, Reducer,
};
use crate::service::{ComputeService, TaskHandle, TaskState};

/// Records submissions and cancellations; never runs anything.
#[derive(Default)]
pub struct FakeComputeService {
    tasks: Mutex<Vec<TaskHandle>>,
    submitted: Mutex<Vec<ExportJob>>,
    cancelled: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    fail_listing: AtomicBool,
    fail_submit: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl FakeComputeService {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_name(&self) -> String {
        format!(
            "projects/test/operations/{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        )
    }

    /// Register a running task with the given description.
    pub fn add_active(&self, description: &str) -> TaskHandle {
        let task = TaskHandle {
            name: self.next_name(),
            description: description.to_string(),
            state: TaskState::Running,
            created: Some(Utc::now()),
        };
        lock(&self.tasks).push(task.clone());
        task
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<ExportJob> {
        lock(&self.submitted).clone()
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        lock(&self.submitted)
            .iter()
            .map(|job| job.id().to_string())
            .collect()
    }

    /// Names of cancelled tasks, in call order.
    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }

    pub fn active_tasks(&self) -> Vec<TaskHandle> {
        lock(&self.tasks)
            .iter()
            .filter(|t| t.state.is_active())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ComputeService for FakeComputeService {
    async fn list_active(&self) -> Result<HashMap<String, TaskHandle>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ComputeError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(self
            .active_tasks()
            .into_iter()
            .map(|t| (t.description.clone(), t))
            .collect())
    }

    async fn submit(&self, job: &ExportJob) -> Result<TaskHandle> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ComputeError::Api {
                status: 500,
                message: "submission rejected".to_string(),
            });
        }
        lock(&self.submitted).push(job.clone());
        Ok(self.add_active(job.id()))
    }

    async fn cancel(&self, task: &TaskHandle) -> Result<()> {
        let mut tasks = lock(&self.tasks);
        for t in tasks.iter_mut().filter(|t| t.name == task.name) {
            t.state = TaskState::Cancelled;
        }
        lock(&self.cancelled).push(task.name.clone());
        Ok(())
    }
}

/// Minimal job with the given id.
pub fn sample_job(id: &str) -> ExportJob {
    ExportJob {
        description: id.to_string(),
        collection: FeatureSource {
            asset_id: "projects/test/fields/ND".to_string(),
            filter: None,
        },
        image: ImageSpec::single(ImageLayer::new("USDA/NASS/CDL/2008")),
        reducer: Reducer::Mode,
        projection: Projection::NativeOf {
            image_id: "USDA/NASS/CDL/2008".to_string(),
        },
        properties: vec![OutputProperty::feature("OPENET_ID")],
        destination: Destination {
            bucket: "test".to_string(),
            file_prefix: format!("temp/{}", id),
        },
        file_format: FileFormat::Csv,
    }
}
