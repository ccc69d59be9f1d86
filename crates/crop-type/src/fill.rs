//! Fill missing crop types from adjacent years.
//!
//! Years after the newest native CDL image are filled forward from the
//! previous year; years before full coverage are filled backward from the
//! following year, newest first, so a fill can chain across several years.
//! Filled provenance always starts with `CROP_<source year>`.

use std::collections::HashMap;

use tracing::{debug, info};

use field_common::Year;
use storage::{CropValue, FieldDataset};

use crate::config::CropTypeConfig;
use crate::error::Result;
use crate::remap::RemapTable;

/// Copy crop types from `source` year into `target` year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPair {
    pub source: Year,
    pub target: Year,
}

/// Ordered fill pairs for the configured years.
pub fn fill_pairs(config: &CropTypeConfig) -> Vec<FillPair> {
    let newest = config.cdl.native_years.max;
    let forward = (newest + 1..=config.years.max).map(|target| FillPair {
        source: target - 1,
        target,
    });
    let backward = (config.years.min..config.full_coverage_from())
        .rev()
        .map(|target| FillPair {
            source: target + 1,
            target,
        });
    forward.chain(backward).collect()
}

/// Value written into the target year for a set source value.
pub fn fill_value(
    source: &CropValue,
    source_year: Year,
    remap: &RemapTable,
    label: &str,
) -> CropValue {
    let mut provenance = if source.source.starts_with("CROP_") {
        source.source.clone()
    } else if source.source.contains(label) {
        format!("CROP_{} - {}", source_year, label)
    } else {
        format!("CROP_{}", source_year)
    };

    let crop = if !provenance.contains(label) && remap.is_authored(source.crop) {
        provenance.push_str(&format!(" - {}", label));
        remap.apply(source.crop)
    } else {
        source.crop
    };

    CropValue::new(crop, provenance)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    pub filled: usize,
    pub kept: usize,
    pub cleared: usize,
}

/// Fills one dataset.
pub struct CropTypeFiller<'a> {
    remap: &'a RemapTable,
    label: &'a str,
    pairs: Vec<FillPair>,
    overwrite: bool,
}

impl<'a> CropTypeFiller<'a> {
    pub fn new(config: &'a CropTypeConfig, remap: &'a RemapTable, overwrite: bool) -> Self {
        Self {
            remap,
            label: &config.remap.label,
            pairs: fill_pairs(config),
            overwrite,
        }
    }

    /// Restrict the pairs to the given target years.
    pub fn with_targets(mut self, years: &[Year]) -> Self {
        self.pairs.retain(|pair| years.contains(&pair.target));
        self
    }

    pub fn pairs(&self) -> &[FillPair] {
        &self.pairs
    }

    /// Clear values previously filled from each pair's source year.
    async fn clear_filled(&self, dataset: &FieldDataset) -> Result<usize> {
        let mut cleared = 0;
        for pair in &self.pairs {
            let prefix = format!("CROP_{}", pair.source);
            for (id, value) in dataset.crop_values(pair.target).await? {
                if value.is_set() && value.source.starts_with(&prefix) {
                    dataset
                        .set_crop(&id, pair.target, &CropValue::default())
                        .await?;
                    cleared += 1;
                }
            }
        }
        Ok(cleared)
    }

    pub async fn fill(&self, dataset: &FieldDataset) -> Result<FillStats> {
        let mut stats = FillStats::default();
        if self.overwrite {
            info!(dataset = %dataset.name(), "Clearing existing filled values");
            stats.cleared = self.clear_filled(dataset).await?;
        }

        for pair in &self.pairs {
            info!(source = pair.source, target = pair.target, "Copying crop types");
            let targets: HashMap<String, CropValue> =
                dataset.crop_values(pair.target).await?.into_iter().collect();

            for (id, source) in dataset.crop_values(pair.source).await? {
                if !source.is_set() {
                    continue;
                }
                let target_set = targets.get(&id).map_or(false, CropValue::is_set);
                if target_set && !self.overwrite {
                    stats.kept += 1;
                    continue;
                }
                let value = fill_value(&source, pair.source, self.remap, self.label);
                dataset.set_crop(&id, pair.target, &value).await?;
                stats.filled += 1;
            }
        }

        debug!(filled = stats.filled, kept = stats.kept, cleared = stats.cleared, "Fill complete");
        Ok(stats)
    }
}
