//! Field dataset updates from exported result tables.
//!
//! Result tables are cached under `{workspace}/csv/` and downloaded only
//! when the cached copy is absent or a refresh is forced. A table missing
//! from both places is logged and skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use field_common::Year;
use storage::{FieldDataset, ObjectStorage, StoragePath};

use crate::config::CropTypeConfig;
use crate::coverage::CoverageTable;
use crate::error::Result;
use crate::jobs::{cdl_export_id, export_id};
use crate::merge::{merge_year, read_results, MergePolicy, MergeStats};

/// Local cache of result tables from one bucket folder.
pub struct ResultCache {
    bucket: ObjectStorage,
    folder: String,
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(bucket: ObjectStorage, folder: impl Into<String>, workspace: &Path) -> Self {
        Self {
            bucket,
            folder: folder.into(),
            dir: workspace.join("csv"),
        }
    }

    pub fn local_path(&self, export_id: &str) -> PathBuf {
        self.dir.join(StoragePath::export_name(export_id, "csv"))
    }

    /// Path of the cached table, downloading it first when absent or `force`.
    ///
    /// Returns `None` when the table exists neither locally nor remotely.
    pub async fn fetch(&self, export_id: &str, force: bool) -> Result<Option<PathBuf>> {
        let local = self.local_path(export_id);
        if force || !local.is_file() {
            let remote = StoragePath::export_file(&self.folder, export_id, "csv");
            debug!(path = %remote, "Downloading result table from bucket");
            match self.bucket.download_to(&remote, &local).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    debug!(path = %remote, "Result table not in bucket");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if local.is_file() {
            Ok(Some(local))
        } else {
            info!(id = %export_id, "Stats file does not exist, skipping");
            Ok(None)
        }
    }
}

/// Outcome of updating one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub tables: usize,
    pub missing_tables: usize,
    pub cleared: bool,
    pub stats: MergeStats,
}

/// Merges crop-type result tables into state field datasets.
pub struct CropTypeUpdater<'a> {
    config: &'a CropTypeConfig,
    coverage: &'a CoverageTable,
    cache: &'a ResultCache,
    overwrite: bool,
}

impl<'a> CropTypeUpdater<'a> {
    pub fn new(
        config: &'a CropTypeConfig,
        coverage: &'a CoverageTable,
        cache: &'a ResultCache,
        overwrite: bool,
    ) -> Self {
        Self {
            config,
            coverage,
            cache,
            overwrite,
        }
    }

    /// Update one state's dataset for the given years (oldest first).
    ///
    /// In overwrite mode the selected years are cleared before merging, so
    /// a field whose new result is 0 ends up unset: the clear resets it, the
    /// merge itself never writes a 0.
    pub async fn update_state(
        &self,
        dataset: &FieldDataset,
        state: &str,
        years: &[Year],
    ) -> Result<StateUpdate> {
        let mut update = StateUpdate::default();

        if self.overwrite {
            info!(state = %state, "Clearing all crop type and source values");
            dataset.clear_years(years).await?;
            update.cleared = true;
        }

        if state == self.config.regional.state {
            self.update_regional_state(dataset, state, years, &mut update)
                .await?;
        } else {
            for year in self.coverage.years_for(state, years) {
                let id = cdl_export_id(state, year);
                let policy = MergePolicy::Cdl;
                self.merge_table(dataset, &id, year, policy, self.overwrite, &mut update)
                    .await?;
            }
        }

        Ok(update)
    }

    /// Regional map first, then the composite fills remaining gaps.
    async fn update_regional_state(
        &self,
        dataset: &FieldDataset,
        state: &str,
        years: &[Year],
        update: &mut StateUpdate,
    ) -> Result<()> {
        let regional = &self.config.regional;
        let policy = MergePolicy::RegionalMap {
            min_fraction: regional.min_coverage_fraction,
        };
        info!(state = %state, "Processing regional crop map");
        for &year in years.iter().filter(|&&y| y >= regional.first_year) {
            let id = export_id(state, &regional.tag, year);
            self.merge_table(dataset, &id, year, policy, self.overwrite, update)
                .await?;
        }

        info!(state = %state, "Processing regional/CDL composite");
        let threshold = self.coverage.full_coverage_from();
        for &year in years.iter().filter(|&&y| y >= threshold) {
            let id = export_id(state, &self.config.composite.tag, year);
            self.merge_table(dataset, &id, year, MergePolicy::Cdl, false, update)
                .await?;
        }
        Ok(())
    }

    /// `overwrite` also forces a fresh download of the table.
    async fn merge_table(
        &self,
        dataset: &FieldDataset,
        id: &str,
        year: Year,
        policy: MergePolicy,
        overwrite: bool,
        update: &mut StateUpdate,
    ) -> Result<()> {
        info!(id = %id, year, "Reading stats and updating dataset");
        let Some(path) = self.cache.fetch(id, overwrite).await? else {
            update.missing_tables += 1;
            return Ok(());
        };

        let records = match read_results(&path, year).await {
            Ok(records) => records,
            Err(e) => {
                warn!(id = %id, error = %e, "Unreadable stats file, skipping");
                update.missing_tables += 1;
                return Ok(());
            }
        };
        update.stats += merge_year(dataset, year, &records, policy, overwrite).await?;
        update.tables += 1;
        Ok(())
    }
}
