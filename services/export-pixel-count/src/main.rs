//! Field Landsat pixel count export tool.
//!
//! For each state dataset, submits one pixel count export per UTM zone
//! found in the fields' MGRS tile ids.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use compute::{ComputeService, HttpComputeService, JobSubmitter};
use crop_type::{open_state_dataset, pixel_count, Tables};
use field_common::{init_tracing, parse_states, CommonArgs, RemoteArgs};
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "export-pixel-count")]
#[command(about = "Export field Landsat pixel counts by state and UTM zone")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    remote: RemoteArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.common.debug, args.common.log_json)?;

    info!("Export field Landsat pixel counts by state");

    let tables = Tables::load(&args.common.config_dir).context("Failed to load crop type tables")?;
    let states = parse_states(&args.common.states)?;
    info!(states = %states.join(", "), "States");

    let credentials = args.remote.credentials()?;
    let compute = &tables.config.compute;
    let service: Arc<dyn ComputeService> = Arc::new(
        HttpComputeService::connect(&compute.endpoint, &credentials, compute.request_timeout())
            .await
            .context("Failed to connect to the compute service")?,
    );

    let location = tables.config.pixel_count.location();
    let bucket = ObjectStorage::new(&ObjectStorageConfig::new(&location.bucket, &credentials))?;
    let mut submitter =
        JobSubmitter::snapshot(service, &bucket, &location.folder, args.common.overwrite).await?;

    let jobs = tables.jobs();
    for state in &states {
        info!(state = %state, "Processing state");
        let Some(dataset) = open_state_dataset(&args.common.workspace, state).await? else {
            continue;
        };
        let submitted = pixel_count::export_state(&mut submitter, &jobs, &dataset, state).await?;
        dataset.close().await;
        info!(state = %state, submitted, "State complete");
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
