//! Crop-type configuration loaded from `crop_type.yaml`.
//!
//! The file holds every hand-maintained table the tools depend on: the year
//! range, CDL coverage by year, split CDL images, the regional crop map
//! years, the land-cover override rule, and the bucket locations. It is
//! versioned and validated at load so a bad edit fails before any remote
//! call is made.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, error};

use field_common::{Year, YearRange};

use crate::error::{CropTypeError, Result};

/// File name of the configuration inside the config directory.
pub const CONFIG_FILE: &str = "crop_type.yaml";

// ============================================================================
// Configuration Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CropTypeConfig {
    /// Reviewable version tag of the tables.
    pub version: String,
    /// Years the tools process.
    pub years: YearRange,
    /// States with field datasets (full coverage applies to these).
    pub states: Vec<String>,
    pub fields: FieldsConfig,
    pub export: BucketFolder,
    pub pixel_count: PixelCountConfig,
    pub cdl: CdlConfig,
    pub landcover: LandcoverConfig,
    pub regional: RegionalConfig,
    #[serde(default)]
    pub composite: CompositeConfig,
    pub remap: RemapConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldsConfig {
    /// Remote feature collections live at `{collection_prefix}/{STATE}`.
    pub collection_prefix: String,
}

impl FieldsConfig {
    pub fn collection(&self, state: &str) -> String {
        format!("{}/{}", self.collection_prefix.trim_end_matches('/'), state)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketFolder {
    pub bucket: String,
    #[serde(default)]
    pub folder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PixelCountConfig {
    pub bucket: String,
    #[serde(default)]
    pub folder: String,
    /// Pixel size of the counting grid in metres.
    #[serde(default = "default_pixel_size")]
    pub pixel_size: f64,
    /// UTM zones scanned when merging counts.
    pub zones: ZoneRange,
}

fn default_pixel_size() -> f64 {
    30.0
}

impl PixelCountConfig {
    pub fn location(&self) -> BucketFolder {
        BucketFolder {
            bucket: self.bucket.clone(),
            folder: self.folder.clone(),
        }
    }

    /// Affine transform of the counting grid, snapped to pixel centres.
    pub fn transform(&self) -> [f64; 6] {
        let size = self.pixel_size;
        [size, 0.0, size / 2.0, 0.0, -size, size / 2.0]
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ZoneRange {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitImage {
    pub year: Year,
    /// Image suffix used by default, e.g. `2005a`.
    pub default: String,
    /// Per-state image suffixes overriding the default.
    #[serde(default)]
    pub states: BTreeMap<String, String>,
    /// States with no valid image this year.
    #[serde(default)]
    pub invalid: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdlConfig {
    pub collection: String,
    #[serde(default = "default_cdl_band")]
    pub band: String,
    /// Years with a full-coverage native image. `min` is the full-coverage
    /// threshold.
    pub native_years: YearRange,
    /// Codes masked out before the reduction (cloud/no data).
    #[serde(default)]
    pub mask_codes: Vec<i64>,
    /// Year -> covered states, for years before the threshold.
    #[serde(default)]
    pub partial_coverage: BTreeMap<Year, Vec<String>>,
    #[serde(default)]
    pub split_images: Vec<SplitImage>,
}

fn default_cdl_band() -> String {
    "cropland".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandcoverOverrideConfig {
    pub from_code: i64,
    pub classes: Vec<i64>,
    pub to_code: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LandcoverConfig {
    pub collection: String,
    /// Years available in the collection; requests are clamped into it.
    pub years: YearRange,
    #[serde(rename = "override")]
    pub override_rule: LandcoverOverrideConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionalConfig {
    pub state: String,
    /// Product tag used in export ids, e.g. `landiq`.
    pub tag: String,
    /// Prefix in composite provenance strings, e.g. `CA`.
    pub label: String,
    pub collection: String,
    /// First year the regional map is used.
    pub first_year: Year,
    pub native_years: Vec<Year>,
    /// Year -> native year whose image stands in for it (remapped).
    #[serde(default)]
    pub substitute_years: BTreeMap<Year, Year>,
    /// Native image used for years between `first_year` and the first
    /// native year.
    pub backfill_year: Year,
    /// Raw codes masked in the backfill image.
    #[serde(default)]
    pub backfill_mask_codes: Vec<i64>,
    /// Minimum fraction of a field covered by the map to accept a result.
    #[serde(default = "default_min_coverage")]
    pub min_coverage_fraction: f64,
}

fn default_min_coverage() -> f64 {
    0.5
}

impl RegionalConfig {
    pub fn native_min(&self) -> Option<Year> {
        self.native_years.iter().copied().min()
    }

    pub fn native_max(&self) -> Option<Year> {
        self.native_years.iter().copied().max()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompositeConfig {
    #[serde(default = "default_composite_tag")]
    pub tag: String,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            tag: default_composite_tag(),
        }
    }
}

fn default_composite_tag() -> String {
    "composite".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemapConfig {
    /// CSV file, relative to the config directory.
    pub table: PathBuf,
    /// Appended to provenance strings of remapped sources.
    #[serde(default = "default_remap_label")]
    pub label: String,
}

fn default_remap_label() -> String {
    "remapped annual crops".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://earthengine.googleapis.com".to_string(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl ComputeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl CropTypeConfig {
    /// Load and validate `crop_type.yaml` from a config directory.
    ///
    /// # Errors
    ///
    /// Returns an error (and logs a CRITICAL message) if the file is missing,
    /// is not valid YAML, or fails validation. Callers should treat errors as
    /// fatal startup errors.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);

        if !path.exists() {
            error!(
                path = ?path,
                "CRITICAL: Crop type configuration not found. Nothing can be processed \
                 without the coverage and source tables."
            );
            return Err(CropTypeError::InvalidConfig(format!(
                "Config not found at {:?}",
                path
            )));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;

        let config = Self::from_yaml(&content).map_err(|e| {
            error!(path = ?path, error = %e, "CRITICAL: Invalid crop type configuration");
            e
        })?;

        debug!(
            version = %config.version,
            years = %config.years,
            states = config.states.len(),
            "Loaded crop type configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: CropTypeConfig = serde_yaml::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        let upper = |s: &mut String| *s = s.trim().to_ascii_uppercase();
        self.states.iter_mut().for_each(upper);
        for states in self.cdl.partial_coverage.values_mut() {
            states.iter_mut().for_each(upper);
        }
        for split in &mut self.cdl.split_images {
            split.invalid.iter_mut().for_each(upper);
            split.states = std::mem::take(&mut split.states)
                .into_iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
                .collect();
        }
        upper(&mut self.regional.state);
    }

    /// Full-coverage threshold: every configured state is covered from here on.
    pub fn full_coverage_from(&self) -> Year {
        self.cdl.native_years.min
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CropTypeError::InvalidConfig(msg));

        if self.version.trim().is_empty() {
            return invalid("version must not be empty".to_string());
        }
        for (name, range) in [
            ("years", self.years),
            ("cdl.native_years", self.cdl.native_years),
            ("landcover.years", self.landcover.years),
        ] {
            if range.min > range.max {
                return invalid(format!("{} range {} is reversed", name, range));
            }
        }
        if self.pixel_count.zones.min > self.pixel_count.zones.max {
            return invalid("pixel_count.zones range is reversed".to_string());
        }
        if self.pixel_count.pixel_size <= 0.0 {
            return invalid("pixel_count.pixel_size must be positive".to_string());
        }

        let states = check_states("states", &self.states)?;
        if states.is_empty() {
            return invalid("states must not be empty".to_string());
        }

        let threshold = self.full_coverage_from();
        for (year, listed) in &self.cdl.partial_coverage {
            if *year >= threshold {
                return invalid(format!(
                    "partial coverage year {} is not before the full coverage threshold {}",
                    year, threshold
                ));
            }
            if *year < self.years.min {
                return invalid(format!(
                    "partial coverage year {} is before the first processed year {}",
                    year, self.years.min
                ));
            }
            let listed = check_states(&format!("partial_coverage[{}]", year), listed)?;
            if let Some(unknown) = listed.difference(&states).next() {
                return invalid(format!(
                    "partial coverage year {} lists unconfigured state {}",
                    year, unknown
                ));
            }
        }

        let mut split_years = BTreeSet::new();
        for split in &self.cdl.split_images {
            if !split_years.insert(split.year) {
                return invalid(format!("split image year {} listed twice", split.year));
            }
            for state in &split.invalid {
                if self.cdl_covered(state, split.year) {
                    return invalid(format!(
                        "{} {} is covered but has no valid CDL image",
                        state, split.year
                    ));
                }
            }
        }

        let regional = &self.regional;
        if !states.contains(&regional.state) {
            return invalid(format!("regional state {} is not configured", regional.state));
        }
        let native: BTreeSet<Year> = regional.native_years.iter().copied().collect();
        let Some(native_min) = native.first().copied() else {
            return invalid("regional.native_years must not be empty".to_string());
        };
        if regional.first_year > native_min {
            return invalid(format!(
                "regional first year {} is after the first native year {}",
                regional.first_year, native_min
            ));
        }
        if !native.contains(&regional.backfill_year) {
            return invalid(format!(
                "regional backfill year {} is not a native year",
                regional.backfill_year
            ));
        }
        for (year, source) in &regional.substitute_years {
            if native.contains(year) {
                return invalid(format!("regional year {} is both native and substituted", year));
            }
            if !native.contains(source) {
                return invalid(format!(
                    "regional substitute for {} uses non-native year {}",
                    year, source
                ));
            }
        }
        if !(regional.min_coverage_fraction > 0.0 && regional.min_coverage_fraction <= 1.0) {
            return invalid(format!(
                "regional.min_coverage_fraction {} must be in (0, 1]",
                regional.min_coverage_fraction
            ));
        }
        if self.remap.label.trim().is_empty() {
            return invalid("remap.label must not be empty".to_string());
        }

        Ok(())
    }

    /// CDL coverage lookup used during validation; see [`crate::CoverageTable`].
    pub(crate) fn cdl_covered(&self, state: &str, year: Year) -> bool {
        if year >= self.full_coverage_from() {
            return self.states.iter().any(|s| s == state);
        }
        self.cdl
            .partial_coverage
            .get(&year)
            .map_or(false, |listed| listed.iter().any(|s| s == state))
    }
}

fn check_states(context: &str, states: &[String]) -> Result<BTreeSet<String>> {
    let mut seen = BTreeSet::new();
    for state in states {
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CropTypeError::InvalidConfig(format!(
                "{}: '{}' is not a state code",
                context, state
            )));
        }
        if !seen.insert(state.clone()) {
            return Err(CropTypeError::InvalidConfig(format!(
                "{}: state {} listed twice",
                context, state
            )));
        }
    }
    Ok(seen)
}
