//! Landsat pixel counts per field.
//!
//! One export per (state, UTM zone); zones come from the `MGRS_TILE` ids in
//! the local dataset. Counts are merged back into `PIXELCOUNT`.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use compute::{JobSubmitter, SubmitOutcome};
use field_common::utm_zone;
use storage::{FieldDataset, StoragePath};

use crate::config::CropTypeConfig;
use crate::error::Result;
use crate::jobs::{pixel_count_export_id, JobBuilder};
use crate::merge::read_pixel_counts;
use crate::update::ResultCache;

/// UTM zones of a set of MGRS tile ids. Malformed ids are ignored.
pub fn utm_zones<'a>(tiles: impl IntoIterator<Item = &'a String>) -> BTreeSet<u8> {
    tiles
        .into_iter()
        .filter_map(|tile| {
            let zone = utm_zone(tile);
            if zone.is_none() {
                debug!(tile = %tile, "Skipping malformed MGRS tile");
            }
            zone
        })
        .collect()
}

/// Submit the pixel count exports of one state.
///
/// Returns the number of submitted jobs.
pub async fn export_state(
    submitter: &mut JobSubmitter,
    jobs: &JobBuilder<'_>,
    dataset: &FieldDataset,
    state: &str,
) -> Result<usize> {
    let tiles = dataset.mgrs_tiles().await?;
    let zones = utm_zones(&tiles);
    info!(state = %state, zones = ?zones, "UTM zones");

    let mut submitted = 0;
    for zone in zones {
        let job = jobs.pixel_count(state, zone);
        if let SubmitOutcome::Submitted(_) = submitter.run(&job).await? {
            submitted += 1;
        }
    }
    Ok(submitted)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelCountUpdate {
    pub tables: usize,
    pub written: usize,
    pub cleared: bool,
}

/// Merges pixel count tables into state datasets.
pub struct PixelCountUpdater<'a> {
    config: &'a CropTypeConfig,
    cache: &'a ResultCache,
    listing: BTreeSet<String>,
    overwrite: bool,
}

impl<'a> PixelCountUpdater<'a> {
    /// `listing` holds the file names in the pixel count folder.
    pub fn new(
        config: &'a CropTypeConfig,
        cache: &'a ResultCache,
        listing: BTreeSet<String>,
        overwrite: bool,
    ) -> Self {
        let listing = listing.into_iter().filter(|name| name.contains("utm")).collect();
        Self {
            config,
            cache,
            listing,
            overwrite,
        }
    }

    pub async fn update_state(
        &self,
        dataset: &FieldDataset,
        state: &str,
    ) -> Result<PixelCountUpdate> {
        let mut update = PixelCountUpdate::default();
        if self.overwrite {
            info!(state = %state, "Clearing all PIXELCOUNT values");
            dataset.clear_pixel_counts().await?;
            update.cleared = true;
        }

        let zones = self.config.pixel_count.zones;
        for zone in zones.min..=zones.max {
            let id = pixel_count_export_id(state, zone);
            if !self.listing.contains(&StoragePath::export_name(&id, "csv")) {
                continue;
            }
            let Some(path) = self.cache.fetch(&id, self.overwrite).await? else {
                continue;
            };
            let counts = match read_pixel_counts(&path).await {
                Ok(counts) => counts,
                Err(e) => {
                    warn!(id = %id, error = %e, "Unreadable pixel count file, skipping");
                    continue;
                }
            };

            info!(id = %id, rows = counts.len(), "Writing pixel counts");
            for (openet_id, count) in &counts {
                if dataset.set_pixel_count(openet_id, *count).await? {
                    update.written += 1;
                }
            }
            update.tables += 1;
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utm_zones_from_tiles() {
        let tiles: Vec<String> = ["10SFH", "11SKA", "10TEK", "XX", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(utm_zones(&tiles), BTreeSet::from([10, 11]));
    }
}
