//! Field crop-type pipeline.
//!
//! Decides which classification image feeds each (state, year), builds the
//! zonal statistics export jobs, and merges the exported tables back into
//! the per-state field datasets.
//!
//! # Tables
//!
//! All hand-maintained knowledge lives in two files in the config
//! directory, loaded together as [`Tables`]:
//!
//! - `crop_type.yaml`: years, states, CDL coverage, split images, regional
//!   map years, land-cover override and bucket locations
//! - the annual crop remap CSV named by `remap.table`
//!
//! # Flow
//!
//! ```text
//! export:  CoverageTable -> SourceSelector -> JobBuilder -> JobSubmitter
//! update:  ResultCache -> merge::parse_results -> merge::merge_year
//! fill:    CropTypeFiller (adjacent year copies)
//! ```

pub mod config;
pub mod coverage;
pub mod error;
pub mod export;
pub mod fill;
pub mod jobs;
pub mod merge;
pub mod pixel_count;
pub mod remap;
pub mod selector;
pub mod update;

use std::path::Path;

use storage::FieldDataset;
use tracing::{debug, info};

pub use config::{CropTypeConfig, CONFIG_FILE};
pub use coverage::CoverageTable;
pub use error::{CropTypeError, Result};
pub use export::{CropTypeExporter, StateExport};
pub use fill::{fill_pairs, fill_value, CropTypeFiller, FillPair, FillStats};
pub use jobs::JobBuilder;
pub use merge::{MergePolicy, MergeStats, ResultRecord};
pub use pixel_count::{PixelCountUpdate, PixelCountUpdater};
pub use remap::RemapTable;
pub use selector::{CompositeSelection, SourceSelection, SourceSelector};
pub use update::{CropTypeUpdater, ResultCache, StateUpdate};

/// Configuration, coverage and remap tables loaded once per run.
#[derive(Debug, Clone)]
pub struct Tables {
    pub config: CropTypeConfig,
    pub coverage: CoverageTable,
    pub remap: RemapTable,
}

impl Tables {
    /// Load `crop_type.yaml` and its remap table from the config directory.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config = CropTypeConfig::load(config_dir)?;
        let remap = RemapTable::load(&config_dir.join(&config.remap.table))?;
        info!(version = %config.version, "Loaded crop type tables");
        Ok(Self::from_parts(config, remap))
    }

    /// Build from configuration and remap CSV text.
    pub fn from_yaml(config: &str, remap_csv: &str) -> Result<Self> {
        let config = CropTypeConfig::from_yaml(config)?;
        let remap = RemapTable::from_reader(remap_csv.as_bytes())?;
        Ok(Self::from_parts(config, remap))
    }

    pub fn from_parts(config: CropTypeConfig, remap: RemapTable) -> Self {
        let coverage = CoverageTable::from_config(&config);
        Self {
            config,
            coverage,
            remap,
        }
    }

    pub fn selector(&self) -> SourceSelector<'_> {
        SourceSelector::new(&self.config, &self.coverage)
    }

    pub fn jobs(&self) -> JobBuilder<'_> {
        JobBuilder::new(&self.config, &self.remap)
    }
}

/// Open a state's field dataset, or `None` when the workspace has none.
pub async fn open_state_dataset(workspace: &Path, state: &str) -> Result<Option<FieldDataset>> {
    let path = FieldDataset::path_for(workspace, state);
    debug!(path = ?path, "Opening field dataset");
    match FieldDataset::open(&path).await {
        Ok(dataset) => Ok(Some(dataset)),
        Err(e) if e.is_not_found() => {
            info!(state = %state, "State dataset does not exist, skipping");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
