//! Field crop type update tool.
//!
//! Downloads the exported crop type tables (or reuses the local `csv/`
//! cache) and merges them into each state's field dataset, oldest year
//! first.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crop_type::{open_state_dataset, CropTypeUpdater, MergeStats, ResultCache, Tables};
use field_common::{init_tracing, parse_states, parse_years, CommonArgs, RemoteArgs, YearArgs};
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "update-crop-type")]
#[command(about = "Update field crop type values by state")]
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
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.common.debug, args.common.log_json)?;

    info!("Updating field crop type values by state");

    let tables = Tables::load(&args.common.config_dir).context("Failed to load crop type tables")?;
    let states = parse_states(&args.common.states)?;
    let years = parse_years(&args.years.years, tables.config.years)?;
    info!(states = %states.join(", "), "States");
    info!(years = ?years, "Years");

    let credentials = args.remote.credentials()?;
    let export = &tables.config.export;
    let bucket = ObjectStorage::new(&ObjectStorageConfig::new(&export.bucket, &credentials))?;
    let cache = ResultCache::new(bucket, export.folder.as_str(), &args.common.workspace);

    let updater = CropTypeUpdater::new(
        &tables.config,
        &tables.coverage,
        &cache,
        args.common.overwrite,
    );

    let mut total = MergeStats::default();
    for state in &states {
        info!(state = %state, "Processing state");
        let Some(dataset) = open_state_dataset(&args.common.workspace, state).await? else {
            continue;
        };
        let update = updater.update_state(&dataset, state, &years).await?;
        dataset.close().await;

        info!(
            state = %state,
            tables = update.tables,
            missing = update.missing_tables,
            written = update.stats.written,
            "State complete"
        );
        total += update.stats;
    }

    info!(
        written = total.written,
        kept = total.kept_existing,
        zero = total.skipped_zero,
        low_coverage = total.low_coverage,
        "Update complete"
    );
    Ok(())
}
