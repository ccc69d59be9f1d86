//! Export job model.
//!
//! An export job asks the remote service to reduce an image over every
//! feature of a collection and write one row per feature to the bucket.
//! The job id doubles as the remote task description and the output file
//! name, which is what makes re-running idempotent.

use serde::{Deserialize, Serialize};

/// Feature collection the statistics are computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSource {
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<PropertyFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyFilter {
    StartsWith { property: String, prefix: String },
}

/// Paired remap lists, applied as `from[i] -> to[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemapPairs {
    pub from: Vec<i64>,
    pub to: Vec<i64>,
}

/// Pixel-level rewrite driven by a land-cover reference layer.
///
/// Where the layer value equals `from_code` and the land-cover image for
/// `year` is one of `classes`, the value becomes `to_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandcoverOverride {
    pub collection: String,
    pub year: i32,
    pub from_code: i64,
    pub classes: Vec<i64>,
    pub to_code: i64,
}

/// One raster layer of an image recipe.
///
/// Steps are applied in order: band select, mask of `mask_values` (raw
/// codes), remap, land-cover override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mask_values: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remap: Option<RemapPairs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landcover_override: Option<LandcoverOverride>,
}

impl ImageLayer {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            band: None,
            mask_values: Vec::new(),
            remap: None,
            landcover_override: None,
        }
    }

    pub fn band(mut self, band: impl Into<String>) -> Self {
        self.band = Some(band.into());
        self
    }

    pub fn mask(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.mask_values.extend(values);
        self
    }

    pub fn remap(mut self, pairs: RemapPairs) -> Self {
        self.remap = Some(pairs);
        self
    }

    pub fn landcover_override(mut self, rule: LandcoverOverride) -> Self {
        self.landcover_override = Some(rule);
        self
    }
}

/// Image the reducer runs over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSpec {
    /// Constant image with a single band named `constant`.
    Constant { value: i64 },
    /// First non-null mosaic of the layers, first layer on top.
    Mosaic { layers: Vec<ImageLayer> },
}

impl ImageSpec {
    pub fn single(layer: ImageLayer) -> Self {
        ImageSpec::Mosaic {
            layers: vec![layer],
        }
    }

    pub fn layers(&self) -> &[ImageLayer] {
        match self {
            ImageSpec::Constant { .. } => &[],
            ImageSpec::Mosaic { layers } => layers,
        }
    }
}

/// Zonal reducer. All reducers are unweighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Output `mode`.
    Mode,
    /// Output `mode`, plus `sum` and `count` over a "value present" mask band
    /// so the caller can compute the fraction of the field covered.
    ModeWithCoverage,
    /// Output `sum`.
    Sum,
}

/// Projection the reduction runs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// Native crs and transform of an image.
    NativeOf { image_id: String },
    Explicit { crs: String, transform: [f64; 6] },
}

/// Value of an output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Copied from the input feature property.
    Feature(String),
    /// Reducer output (`mode`, `sum`, `count`).
    Reduced(String),
    Constant(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputProperty {
    pub name: String,
    pub value: PropertyValue,
}

impl OutputProperty {
    pub fn feature(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: PropertyValue::Feature(name.clone()),
            name,
        }
    }

    pub fn reduced(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Reduced(output.into()),
        }
    }

    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Constant(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: String,
    /// Object path without extension; the service appends it.
    pub file_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    #[default]
    Csv,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
        }
    }
}

/// A complete table export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Deterministic id, lowercase; becomes the task description.
    pub description: String,
    pub collection: FeatureSource,
    pub image: ImageSpec,
    pub reducer: Reducer,
    pub projection: Projection,
    pub properties: Vec<OutputProperty>,
    pub destination: Destination,
    #[serde(default)]
    pub file_format: FileFormat,
}

impl ExportJob {
    pub fn id(&self) -> &str {
        &self.description
    }
}
