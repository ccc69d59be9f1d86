//! Fill missing field crop types.
//!
//! Copies crop types into years without a usable CDL image from the
//! nearest processed year. Runs entirely against the local datasets.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crop_type::{open_state_dataset, CropTypeFiller, Tables};
use field_common::{init_tracing, parse_states, parse_years, CommonArgs, YearArgs};

#[derive(Parser, Debug)]
#[command(name = "fill-crop-types")]
#[command(about = "Fill missing crop type values")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    // Restricts the filled target years
    #[command(flatten)]
    years: YearArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.common.debug, args.common.log_json)?;

    info!("Fill missing crop type values");

    let tables = Tables::load(&args.common.config_dir).context("Failed to load crop type tables")?;
    let states = parse_states(&args.common.states)?;
    let years = parse_years(&args.years.years, tables.config.years)?;
    info!(states = %states.join(", "), "States");

    let filler =
        CropTypeFiller::new(&tables.config, &tables.remap, args.common.overwrite).with_targets(&years);
    for pair in filler.pairs() {
        info!(source = pair.source, target = pair.target, "Fill pair");
    }

    for state in &states {
        info!(state = %state, "Processing state");
        let Some(dataset) = open_state_dataset(&args.common.workspace, state).await? else {
            continue;
        };
        let stats = filler.fill(&dataset).await?;
        dataset.close().await;
        info!(
            state = %state,
            filled = stats.filled,
            kept = stats.kept,
            cleared = stats.cleared,
            "State complete"
        );
    }

    Ok(())
}
