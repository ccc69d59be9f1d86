//! Source image selection.
//!
//! Resolves which classification image feeds a (state, year) export and the
//! provenance string that travels with the result into the field dataset.
//! Selection is a pure function of the configuration tables.
//!
//! CDL resolution order (first match wins):
//! 1. year after the newest native image: newest image, remapped
//! 2. year before full coverage and the state is not covered: oldest
//!    full-coverage image, remapped
//! 3. split image year: the state's half, or a fatal error if the state has
//!    no valid half
//! 4. the native image for the year

use std::fmt::Display;

use field_common::Year;

use crate::config::CropTypeConfig;
use crate::coverage::CoverageTable;
use crate::error::{CropTypeError, Result};

/// A resolved source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSelection {
    pub image_id: String,
    /// Written to `CSRC_<year>` unmodified.
    pub provenance: String,
    /// Whether the annual crop remap is applied.
    pub remapped: bool,
    /// Raw codes masked before the reduction.
    pub mask_codes: Vec<i64>,
}

/// Regional map over CDL mosaic for the regional state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSelection {
    /// `None` before the regional map's first year (CDL only).
    pub regional: Option<SourceSelection>,
    pub cdl: SourceSelection,
    /// Image whose projection the reduction runs in.
    pub projection_image: String,
    pub provenance: String,
}

fn last_segment(image_id: &str) -> &str {
    image_id.rsplit('/').next().unwrap_or(image_id)
}

pub struct SourceSelector<'a> {
    config: &'a CropTypeConfig,
    coverage: &'a CoverageTable,
}

impl<'a> SourceSelector<'a> {
    pub fn new(config: &'a CropTypeConfig, coverage: &'a CoverageTable) -> Self {
        Self { config, coverage }
    }

    fn image_id(collection: &str, key: impl Display) -> String {
        format!("{}/{}", collection.trim_end_matches('/'), key)
    }

    fn remapped(&self, image_id: String, mask_codes: Vec<i64>) -> SourceSelection {
        SourceSelection {
            provenance: format!("{} - {}", image_id, self.config.remap.label),
            image_id,
            remapped: true,
            mask_codes,
        }
    }

    fn direct(image_id: String, mask_codes: Vec<i64>) -> SourceSelection {
        SourceSelection {
            provenance: image_id.clone(),
            image_id,
            remapped: false,
            mask_codes,
        }
    }

    /// CDL image for a (state, year).
    ///
    /// Fails only for a state/year configured as having no valid image.
    pub fn cdl(&self, state: &str, year: Year) -> Result<SourceSelection> {
        let cdl = &self.config.cdl;
        let mask = cdl.mask_codes.clone();

        if year > cdl.native_years.max {
            let id = Self::image_id(&cdl.collection, cdl.native_years.max);
            return Ok(self.remapped(id, mask));
        }
        if year < cdl.native_years.min && !self.coverage.is_covered(state, year) {
            let id = Self::image_id(&cdl.collection, cdl.native_years.min);
            return Ok(self.remapped(id, mask));
        }
        if let Some(split) = cdl.split_images.iter().find(|s| s.year == year) {
            if split.invalid.iter().any(|s| s == state) {
                return Err(CropTypeError::InvalidSource {
                    state: state.to_string(),
                    year,
                    reason: format!("{} CDL image should not be used", year),
                });
            }
            let suffix = split.states.get(state).unwrap_or(&split.default);
            return Ok(Self::direct(Self::image_id(&cdl.collection, suffix), mask));
        }

        Ok(Self::direct(Self::image_id(&cdl.collection, year), mask))
    }

    /// Regional map image for a year, ignoring the first-year cutoff.
    fn regional_image(&self, year: Year) -> Result<SourceSelection> {
        let regional = &self.config.regional;
        let image = |y: Year| Self::image_id(&regional.collection, y);

        if regional.native_years.contains(&year) {
            return Ok(Self::direct(image(year), Vec::new()));
        }
        if let Some(max) = regional.native_max().filter(|max| year > *max) {
            return Ok(self.remapped(image(max), Vec::new()));
        }
        if let Some(source) = regional.substitute_years.get(&year) {
            return Ok(self.remapped(image(*source), Vec::new()));
        }
        if regional.native_min().map_or(false, |min| year < min) {
            return Ok(self.remapped(
                image(regional.backfill_year),
                regional.backfill_mask_codes.clone(),
            ));
        }

        Err(CropTypeError::InvalidSource {
            state: regional.state.clone(),
            year,
            reason: "unexpected regional crop map year".to_string(),
        })
    }

    /// Regional map image, or `None` before its first year.
    pub fn regional(&self, year: Year) -> Result<Option<SourceSelection>> {
        if year < self.config.regional.first_year {
            return Ok(None);
        }
        self.regional_image(year).map(Some)
    }

    /// Regional-over-CDL composite, or `None` before full CDL coverage.
    ///
    /// CDL is always remapped here; its year is clamped to the native range.
    pub fn composite(&self, year: Year) -> Result<Option<CompositeSelection>> {
        let cdl = &self.config.cdl;
        if year < cdl.native_years.min {
            return Ok(None);
        }

        let cdl_id = Self::image_id(&cdl.collection, cdl.native_years.clamp(year));
        let cdl_selection = self.remapped(cdl_id, cdl.mask_codes.clone());
        let regional_image = self.regional_image(year)?;
        let projection_image = regional_image.image_id.clone();

        if year < self.config.regional.first_year {
            return Ok(Some(CompositeSelection {
                regional: None,
                provenance: cdl_selection.provenance.clone(),
                cdl: cdl_selection,
                projection_image,
            }));
        }

        let provenance = format!(
            "{}{} CDL{} composite - {}",
            self.config.regional.label,
            last_segment(&regional_image.image_id),
            last_segment(&cdl_selection.image_id),
            self.config.remap.label
        );

        Ok(Some(CompositeSelection {
            regional: Some(regional_image),
            cdl: cdl_selection,
            projection_image,
            provenance,
        }))
    }

    /// Land-cover year used for the pasture override.
    pub fn landcover_year(&self, year: Year) -> Year {
        self.config.landcover.years.clamp(year)
    }
}
