//! Remote service credential selection.
//!
//! Credentials are resolved once at process start and passed explicitly to
//! the storage and compute clients. Resolution order: explicit service
//! account key file, then project id, then ambient default credentials.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{FieldError, FieldResult};

/// Environment variable consulted for the project in ambient mode.
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    project_id: Option<String>,
    client_email: Option<String>,
}

/// Resolved credential source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service account JSON key file.
    KeyFile {
        path: PathBuf,
        project_id: Option<String>,
        client_email: Option<String>,
    },
    /// User credentials scoped to an explicit project.
    Project(String),
    /// Whatever the environment provides (application default credentials).
    Ambient { project_id: Option<String> },
}

impl Credentials {
    /// Resolve credentials from the command line values.
    ///
    /// A key file that does not exist or is not a service account key is an
    /// error; the run should not continue with partial credentials.
    pub fn resolve(key: Option<&Path>, project: Option<&str>) -> FieldResult<Self> {
        if let Some(path) = key {
            let text = std::fs::read_to_string(path).map_err(|e| {
                FieldError::Credentials(format!("Failed to read key file {:?}: {}", path, e))
            })?;
            let parsed: ServiceAccountKey = serde_json::from_str(&text).map_err(|e| {
                FieldError::Credentials(format!("Invalid key file {:?}: {}", path, e))
            })?;
            info!(path = ?path, "Using service account key file");
            return Ok(Credentials::KeyFile {
                path: path.to_path_buf(),
                project_id: project.map(str::to_string).or(parsed.project_id),
                client_email: parsed.client_email,
            });
        }

        if let Some(project) = project.filter(|p| !p.trim().is_empty()) {
            info!(project = %project, "Using project credentials");
            return Ok(Credentials::Project(project.trim().to_string()));
        }

        info!("Using default credentials");
        Ok(Credentials::Ambient {
            project_id: std::env::var(PROJECT_ENV).ok().filter(|p| !p.is_empty()),
        })
    }

    /// Project the remote service calls are billed to, if known.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Credentials::KeyFile { project_id, .. } => project_id.as_deref(),
            Credentials::Project(project) => Some(project),
            Credentials::Ambient { project_id } => project_id.as_deref(),
        }
    }

    /// Project id, or an error when none could be determined.
    pub fn require_project(&self) -> FieldResult<&str> {
        self.project_id().ok_or_else(|| {
            FieldError::Credentials(format!(
                "No project id: pass --project, use a key file with project_id, or set {}",
                PROJECT_ENV
            ))
        })
    }

    /// Key file path when running as a service account.
    pub fn key_file(&self) -> Option<&Path> {
        match self {
            Credentials::KeyFile { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::KeyFile {
                client_email: Some(email),
                ..
            } => write!(f, "service account {}", email),
            Credentials::KeyFile { path, .. } => write!(f, "key file {}", path.display()),
            Credentials::Project(project) => write!(f, "project {}", project),
            Credentials::Ambient { .. } => write!(f, "default credentials"),
        }
    }
}
