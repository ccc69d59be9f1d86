//! HTTP client for the remote compute service.
//!
//! Speaks the service's JSON REST surface:
//! - `GET  {endpoint}/v1/projects/{project}/operations` (paged task list)
//! - `POST {endpoint}/v1/projects/{project}/table:export`
//! - `POST {endpoint}/v1/{operation}:cancel`
//!
//! The `table:export` body is this crate's own [`ExportJob`] JSON, not the
//! real service's expression graph. It is not wire compatible with the
//! public Earth Engine API; an endpoint must accept the job schema as is.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use field_common::Credentials;

use crate::error::{ComputeError, Result};
use crate::job::ExportJob;
use crate::service::{ComputeService, TaskHandle, TaskState};

/// Environment variable holding a pre-issued bearer token.
pub const ACCESS_TOKEN_ENV: &str = "COMPUTE_ACCESS_TOKEN";

const PAGE_SIZE: u32 = 500;

/// Connection settings for the compute service.
#[derive(Debug, Clone)]
pub struct HttpComputeConfig {
    /// Base URL, e.g. `https://earthengine.googleapis.com`
    pub endpoint: String,
    pub project: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationMetadata {
    #[serde(default)]
    description: String,
    state: Option<TaskState>,
    create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    metadata: Option<OperationMetadata>,
}

impl Operation {
    fn into_handle(self, fallback_description: &str) -> TaskHandle {
        let (description, state, created) = match self.metadata {
            Some(meta) => (
                meta.description,
                meta.state.unwrap_or(TaskState::Pending),
                meta.create_time,
            ),
            None => (String::new(), TaskState::Pending, None),
        };
        let state = if self.done && state.is_active() {
            TaskState::Unknown
        } else {
            state
        };
        TaskHandle {
            name: self.name,
            description: if description.is_empty() {
                fallback_description.to_string()
            } else {
                description
            },
            state,
            created,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationList {
    #[serde(default)]
    operations: Vec<Operation>,
    next_page_token: Option<String>,
}

/// Compute service over HTTP with a bearer token resolved at connect time.
pub struct HttpComputeService {
    client: Client,
    config: HttpComputeConfig,
    token: String,
}

impl HttpComputeService {
    /// Build a client and obtain an access token for `credentials`.
    ///
    /// Fails if no token can be obtained; the run must not continue with
    /// partial credentials.
    pub async fn connect(
        endpoint: &str,
        credentials: &Credentials,
        request_timeout: Duration,
    ) -> Result<Self> {
        let project = credentials
            .require_project()
            .map_err(|e| ComputeError::Auth(e.to_string()))?
            .to_string();

        let token = access_token(credentials.key_file().map(|p| p.to_path_buf())).await?;
        info!(project = %project, credentials = %credentials, "Connected to compute service");

        Self::with_token(
            HttpComputeConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                project,
                request_timeout,
            },
            token,
        )
    }

    /// Build a client around an already issued token.
    pub fn with_token(config: HttpComputeConfig, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            token,
        })
    }

    fn project_url(&self, path: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.config.endpoint, self.config.project, path
        )
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ComputeError::Auth(message)),
            code => Err(ComputeError::Api {
                status: code,
                message,
            }),
        }
    }
}

// TODO: refresh the token when a run outlives its one hour lifetime.
async fn access_token(key_file: Option<PathBuf>) -> Result<String> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            debug!("Using access token from environment");
            return Ok(token.trim().to_string());
        }
    }

    let mut cmd = tokio::process::Command::new("gcloud");
    cmd.args(["auth", "application-default", "print-access-token"]);
    if let Some(path) = key_file {
        cmd.env("GOOGLE_APPLICATION_CREDENTIALS", path);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| ComputeError::Auth(format!("Failed to run gcloud: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ComputeError::Auth(format!(
            "gcloud could not issue an access token: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(ComputeError::Auth("gcloud returned an empty token".to_string()));
    }
    Ok(token)
}

#[async_trait]
impl ComputeService for HttpComputeService {
    #[instrument(skip(self), fields(project = %self.config.project))]
    async fn list_active(&self) -> Result<HashMap<String, TaskHandle>> {
        let mut active = HashMap::new();
        let mut page_token: Option<String> = None;
        let mut total = 0usize;

        loop {
            let mut request = self
                .client
                .get(self.project_url("operations"))
                .bearer_auth(&self.token)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = Self::check(request.send().await?).await?;
            let page: OperationList = response
                .json()
                .await
                .map_err(|e| ComputeError::InvalidResponse(e.to_string()))?;

            total += page.operations.len();
            for op in page.operations {
                let handle = op.into_handle("");
                if handle.state.is_active() && !handle.description.is_empty() {
                    active.entry(handle.description.clone()).or_insert(handle);
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(tasks = total, active = active.len(), "Listed remote tasks");
        Ok(active)
    }

    #[instrument(skip(self, job), fields(id = %job.id()))]
    async fn submit(&self, job: &ExportJob) -> Result<TaskHandle> {
        let response = self
            .client
            .post(self.project_url("table:export"))
            .bearer_auth(&self.token)
            .json(job)
            .send()
            .await?;

        let op: Operation = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ComputeError::InvalidResponse(e.to_string()))?;

        let handle = op.into_handle(job.id());
        debug!(task = %handle.name, "Export task started");
        Ok(handle)
    }

    #[instrument(skip(self), fields(task = %task.name))]
    async fn cancel(&self, task: &TaskHandle) -> Result<()> {
        let url = format!("{}/v1/{}:cancel", self.config.endpoint, task.name);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
