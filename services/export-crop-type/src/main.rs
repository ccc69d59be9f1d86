//! Field crop type export tool.
//!
//! Submits one zonal statistics export per covered (state, year):
//! - CDL mode per field for every state except the regional map state
//! - regional crop map and regional/CDL composite for the regional state
//!
//! Exports already running or already in the bucket are skipped unless
//! `--overwrite` is given.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use compute::{ComputeService, HttpComputeService, JobSubmitter};
use crop_type::{CropTypeExporter, Tables};
use field_common::{init_tracing, parse_states, parse_years, CommonArgs, RemoteArgs, YearArgs};
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "export-crop-type")]
#[command(about = "Export field crop type zonal statistics by state")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    years: YearArgs,

    #[command(flatten)]
    remote: RemoteArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.common.debug, args.common.log_json)?;

    info!("Export field crop type stats by state");

    let tables = Tables::load(&args.common.config_dir).context("Failed to load crop type tables")?;
    let states = parse_states(&args.common.states)?;
    // Newest first
    let mut years = parse_years(&args.years.years, tables.config.years)?;
    years.reverse();
    info!(states = %states.join(", "), "States");
    info!(years = ?years, "Years");

    let credentials = args.remote.credentials()?;
    let compute = &tables.config.compute;
    let service: Arc<dyn ComputeService> = Arc::new(
        HttpComputeService::connect(&compute.endpoint, &credentials, compute.request_timeout())
            .await
            .context("Failed to connect to the compute service")?,
    );

    let export = &tables.config.export;
    let bucket = ObjectStorage::new(&ObjectStorageConfig::new(&export.bucket, &credentials))?;
    let mut submitter =
        JobSubmitter::snapshot(service, &bucket, &export.folder, args.common.overwrite).await?;

    let exporter = CropTypeExporter::new(&tables);
    for state in &states {
        info!(state = %state, "Processing state");
        let result = exporter.export_state(&mut submitter, state, &years).await?;
        info!(
            state = %state,
            submitted = result.submitted,
            skipped = result.skipped,
            uncovered = result.uncovered,
            "State complete"
        );
    }

    let summary = submitter.summary();
    info!(
        submitted = summary.submitted,
        cancelled = summary.cancelled,
        skipped_active = summary.skipped_active,
        skipped_existing = summary.skipped_existing,
        "Export complete"
    );
    Ok(())
}
