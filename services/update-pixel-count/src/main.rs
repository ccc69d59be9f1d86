//! Field Landsat pixel count update tool.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crop_type::{open_state_dataset, PixelCountUpdater, ResultCache, Tables};
use field_common::{init_tracing, parse_states, CommonArgs, RemoteArgs};
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "update-pixel-count")]
#[command(about = "Update field Landsat pixel counts by state")]
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

    info!("Updating field Landsat pixel counts by state");

    let tables = Tables::load(&args.common.config_dir).context("Failed to load crop type tables")?;
    let states = parse_states(&args.common.states)?;
    info!(states = %states.join(", "), "States");

    let credentials = args.remote.credentials()?;
    let location = tables.config.pixel_count.location();
    let bucket = ObjectStorage::new(&ObjectStorageConfig::new(&location.bucket, &credentials))?;

    info!(bucket = %location.bucket, folder = %location.folder, "Getting bucket file list");
    let listing = bucket.list_names(&location.folder).await?;
    let cache = ResultCache::new(bucket, location.folder.as_str(), &args.common.workspace);
    let updater = PixelCountUpdater::new(&tables.config, &cache, listing, args.common.overwrite);

    for state in &states {
        info!(state = %state, "Processing state");
        let Some(dataset) = open_state_dataset(&args.common.workspace, state).await? else {
            continue;
        };
        let update = updater.update_state(&dataset, state).await?;
        dataset.close().await;
        info!(
            state = %state,
            tables = update.tables,
            written = update.written,
            "State complete"
        );
    }

    Ok(())
}
