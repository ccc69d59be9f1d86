//! Result table parsing and merging into a field dataset.
//!
//! A result table has one row per field with `OPENET_ID`, `CROP_<year>`,
//! `CSRC_<year>` and, for regional map exports, `PIXEL_COUNT` and
//! `PIXEL_TOTAL`. Platform columns (`system:index`, `.geo`) are ignored.
//!
//! Merge rules for a feature present on both sides:
//! - a result crop of 0 never writes
//! - an existing non-zero crop is kept unless overwriting
//! - otherwise crop and provenance are replaced together
//!
//! Regional map results are filtered first: rows with `PIXEL_TOTAL <= 0` or
//! a covered fraction under the configured minimum are dropped, even when
//! overwriting.

use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use field_common::Year;
use storage::{CropValue, FieldDataset};

use crate::error::{CropTypeError, Result};

const ID_COLUMN: &str = "OPENET_ID";
const PIXEL_COUNT_COLUMN: &str = "PIXEL_COUNT";
const PIXEL_TOTAL_COLUMN: &str = "PIXEL_TOTAL";
const PIXELCOUNT_COLUMN: &str = "PIXELCOUNT";

/// One row of a crop-type result table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub crop: i64,
    pub source: String,
    pub pixel_count: Option<f64>,
    pub pixel_total: Option<f64>,
}

impl ResultRecord {
    pub fn new(crop: i64, source: impl Into<String>) -> Self {
        Self {
            crop,
            source: source.into(),
            pixel_count: None,
            pixel_total: None,
        }
    }

    pub fn with_coverage(mut self, count: f64, total: f64) -> Self {
        self.pixel_count = Some(count);
        self.pixel_total = Some(total);
        self
    }

    /// Fraction of the field covered, `None` without a positive total.
    pub fn coverage_fraction(&self) -> Option<f64> {
        match (self.pixel_count, self.pixel_total) {
            (Some(count), Some(total)) if total > 0.0 => Some(count / total),
            _ => None,
        }
    }
}

/// Crop code from result text. Anything that is not a non-negative number is 0.
pub fn parse_crop(text: &str) -> i64 {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return value.max(0);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value.trunc() as i64,
        _ => 0,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn malformed(path: &str, message: impl Into<String>) -> CropTypeError {
    CropTypeError::MalformedResult {
        path: path.to_string(),
        message: message.into(),
    }
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn required_column(headers: &StringRecord, name: &str, path: &str) -> Result<usize> {
    column(headers, name).ok_or_else(|| malformed(path, format!("missing column {}", name)))
}

/// Parse a crop-type result table for `year`, keyed by `OPENET_ID`.
///
/// `label` only names the table in errors.
pub fn parse_results(data: &[u8], year: Year, label: &str) -> Result<BTreeMap<String, ResultRecord>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(data);
    let headers = reader.headers()?.clone();

    let id_idx = required_column(&headers, ID_COLUMN, label)?;
    let crop_idx = required_column(&headers, &format!("CROP_{}", year), label)?;
    let source_idx = required_column(&headers, &format!("CSRC_{}", year), label)?;
    let count_idx = column(&headers, PIXEL_COUNT_COLUMN);
    let total_idx = column(&headers, PIXEL_TOTAL_COLUMN);

    let mut records = BTreeMap::new();
    for row in reader.records() {
        let row = row?;
        let Some(id) = row.get(id_idx).filter(|id| !id.is_empty()) else {
            continue;
        };
        let crop = row.get(crop_idx).map_or(0, parse_crop);
        if crop == 0 {
            debug!(id, "Missing crop type");
        }
        let record = ResultRecord {
            crop,
            source: row.get(source_idx).unwrap_or_default().to_string(),
            pixel_count: count_idx.and_then(|i| row.get(i)).and_then(parse_number),
            pixel_total: total_idx.and_then(|i| row.get(i)).and_then(parse_number),
        };
        records.insert(id.to_string(), record);
    }
    Ok(records)
}

/// Read a cached crop-type result table.
pub async fn read_results(path: &Path, year: Year) -> Result<BTreeMap<String, ResultRecord>> {
    let data = tokio::fs::read(path).await?;
    parse_results(&data, year, &path.display().to_string())
}

/// Parse a pixel count table. Rows without a numeric `PIXELCOUNT` are skipped.
pub fn parse_pixel_counts(data: &[u8], label: &str) -> Result<BTreeMap<String, i64>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(data);
    let headers = reader.headers()?.clone();
    let id_idx = required_column(&headers, ID_COLUMN, label)?;
    let count_idx = required_column(&headers, PIXELCOUNT_COLUMN, label)?;

    let mut counts = BTreeMap::new();
    for row in reader.records() {
        let row = row?;
        let Some(id) = row.get(id_idx).filter(|id| !id.is_empty()) else {
            continue;
        };
        match row.get(count_idx).and_then(parse_number) {
            Some(value) => {
                counts.insert(id.to_string(), value.round() as i64);
            }
            None => debug!(id, "Missing pixel count"),
        }
    }
    Ok(counts)
}

pub async fn read_pixel_counts(path: &Path) -> Result<BTreeMap<String, i64>> {
    let data = tokio::fs::read(path).await?;
    parse_pixel_counts(&data, &path.display().to_string())
}

/// How a result table is filtered before merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergePolicy {
    Cdl,
    RegionalMap { min_fraction: f64 },
}

impl MergePolicy {
    pub fn accepts(&self, record: &ResultRecord) -> bool {
        match self {
            MergePolicy::Cdl => true,
            MergePolicy::RegionalMap { min_fraction } => record
                .coverage_fraction()
                .map_or(false, |fraction| fraction >= *min_fraction),
        }
    }
}

/// Per-feature merge decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    Write(CropValue),
    Unchanged,
    SkipZero,
    KeepExisting,
}

/// Decide the merge of one result into an existing value.
pub fn decide(existing: &CropValue, record: &ResultRecord, overwrite: bool) -> MergeDecision {
    if record.crop == 0 {
        return MergeDecision::SkipZero;
    }
    if existing.is_set() && !overwrite {
        return MergeDecision::KeepExisting;
    }
    let value = CropValue::new(record.crop, record.source.as_str());
    if *existing == value {
        MergeDecision::Unchanged
    } else {
        MergeDecision::Write(value)
    }
}

/// Counters for one merged table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub written: usize,
    pub unchanged: usize,
    pub skipped_zero: usize,
    pub kept_existing: usize,
    pub low_coverage: usize,
    pub unknown_ids: usize,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.skipped_zero += other.skipped_zero;
        self.kept_existing += other.kept_existing;
        self.low_coverage += other.low_coverage;
        self.unknown_ids += other.unknown_ids;
    }
}

/// Merge one year of results into the dataset.
pub async fn merge_year(
    dataset: &FieldDataset,
    year: Year,
    records: &BTreeMap<String, ResultRecord>,
    policy: MergePolicy,
    overwrite: bool,
) -> Result<MergeStats> {
    let existing: HashMap<String, CropValue> = dataset.crop_values(year).await?.into_iter().collect();
    let mut stats = MergeStats::default();

    for (id, record) in records {
        let Some(current) = existing.get(id) else {
            stats.unknown_ids += 1;
            continue;
        };
        if !policy.accepts(record) {
            stats.low_coverage += 1;
            continue;
        }
        match decide(current, record, overwrite) {
            MergeDecision::Write(value) => {
                dataset.set_crop(id, year, &value).await?;
                stats.written += 1;
            }
            MergeDecision::Unchanged => stats.unchanged += 1,
            MergeDecision::SkipZero => stats.skipped_zero += 1,
            MergeDecision::KeepExisting => stats.kept_existing += 1,
        }
    }

    info!(
        dataset = %dataset.name(),
        year,
        written = stats.written,
        kept = stats.kept_existing,
        zero = stats.skipped_zero,
        low_coverage = stats.low_coverage,
        "Merged crop type values"
    );
    Ok(stats)
}
