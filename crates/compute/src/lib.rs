//! Remote compute service integration.
//!
//! Zonal statistics are computed by a managed geospatial service. This crate
//! describes export jobs, talks to the service, and submits jobs
//! idempotently against the active task list and the output bucket.
//!
//! # Architecture
//!
//! - [`ExportJob`] is the request: feature collection, image recipe,
//!   reducer, projection, output columns and destination.
//! - [`ComputeService`] is the capability interface (`submit`,
//!   `list_active`, `cancel`). [`HttpComputeService`] implements it over
//!   HTTP; [`testing::FakeComputeService`] implements it in memory.
//! - [`JobSubmitter`] snapshots active tasks and bucket outputs once per run
//!   and decides per job id whether to skip, cancel and resubmit, or submit.

pub mod error;
pub mod http;
pub mod job;
pub mod service;
pub mod submitter;
pub mod testing;

pub use error::{ComputeError, Result};
pub use http::{HttpComputeConfig, HttpComputeService};
pub use job::{
    Destination, ExportJob, FeatureSource, FileFormat, ImageLayer, ImageSpec, LandcoverOverride,
    OutputProperty, Projection, PropertyFilter, PropertyValue, Reducer, RemapPairs,
};
pub use service::{ComputeService, TaskHandle, TaskState};
pub use submitter::{Claim, JobSubmitter, SkipReason, SubmitOutcome, SubmitSummary};
