//! Export job recipes.
//!
//! Turns a source selection into the export job submitted to the compute
//! service. Output rows always carry `OPENET_ID`, `CROP_<year>` and
//! `CSRC_<year>`; regional map rows add `PIXEL_COUNT` / `PIXEL_TOTAL`.

use compute::{
    Destination, ExportJob, FeatureSource, FileFormat, ImageLayer, ImageSpec, LandcoverOverride,
    OutputProperty, Projection, PropertyFilter, Reducer,
};
use field_common::Year;
use storage::StoragePath;

use crate::config::{BucketFolder, CropTypeConfig};
use crate::remap::RemapTable;
use crate::selector::{CompositeSelection, SourceSelection};

/// Deterministic export id, `{state}_{product}_{key}` lowercased.
pub fn export_id(state: &str, product: &str, key: impl std::fmt::Display) -> String {
    format!("{}_{}_{}", state, product, key).to_lowercase()
}

pub fn cdl_export_id(state: &str, year: Year) -> String {
    export_id(state, "cdl", year)
}

pub fn pixel_count_export_id(state: &str, zone: u8) -> String {
    export_id(state, "landsat", format!("utm{}", zone))
}

/// Builds export jobs from selections.
pub struct JobBuilder<'a> {
    config: &'a CropTypeConfig,
    remap: &'a RemapTable,
}

impl<'a> JobBuilder<'a> {
    pub fn new(config: &'a CropTypeConfig, remap: &'a RemapTable) -> Self {
        Self { config, remap }
    }

    pub fn regional_export_id(&self, year: Year) -> String {
        export_id(&self.config.regional.state, &self.config.regional.tag, year)
    }

    pub fn composite_export_id(&self, year: Year) -> String {
        export_id(&self.config.regional.state, &self.config.composite.tag, year)
    }

    fn destination(location: &BucketFolder, id: &str) -> Destination {
        Destination {
            bucket: location.bucket.clone(),
            file_prefix: StoragePath::export_prefix(&location.folder, id),
        }
    }

    fn fields(&self, state: &str) -> FeatureSource {
        FeatureSource {
            asset_id: self.config.fields.collection(state),
            filter: None,
        }
    }

    fn layer(&self, selection: &SourceSelection, band: Option<&str>) -> ImageLayer {
        let mut layer = ImageLayer::new(&selection.image_id).mask(selection.mask_codes.iter().copied());
        if let Some(band) = band {
            layer = layer.band(band);
        }
        if selection.remapped {
            layer = layer.remap(self.remap.pairs());
        }
        layer
    }

    fn landcover_override(&self, year: Year) -> LandcoverOverride {
        let landcover = &self.config.landcover;
        LandcoverOverride {
            collection: landcover.collection.clone(),
            year: landcover.years.clamp(year),
            from_code: landcover.override_rule.from_code,
            classes: landcover.override_rule.classes.clone(),
            to_code: landcover.override_rule.to_code,
        }
    }

    fn crop_properties(year: Year, provenance: &str) -> Vec<OutputProperty> {
        vec![
            OutputProperty::feature("OPENET_ID"),
            OutputProperty::reduced(format!("CROP_{}", year), "mode"),
            OutputProperty::constant(format!("CSRC_{}", year), provenance),
        ]
    }

    fn cdl_layer(&self, selection: &SourceSelection, year: Year) -> ImageLayer {
        self.layer(selection, Some(&self.config.cdl.band))
            .landcover_override(self.landcover_override(year))
    }

    /// Zonal mode of a CDL image over a state's fields.
    pub fn cdl(&self, state: &str, year: Year, selection: &SourceSelection) -> ExportJob {
        let id = cdl_export_id(state, year);
        ExportJob {
            collection: self.fields(state),
            image: ImageSpec::single(self.cdl_layer(selection, year)),
            reducer: Reducer::Mode,
            projection: Projection::NativeOf {
                image_id: selection.image_id.clone(),
            },
            properties: Self::crop_properties(year, &selection.provenance),
            destination: Self::destination(&self.config.export, &id),
            file_format: FileFormat::Csv,
            description: id,
        }
    }

    /// Zonal mode of the regional map, with coverage counts.
    pub fn regional(&self, year: Year, selection: &SourceSelection) -> ExportJob {
        let id = self.regional_export_id(year);
        let mut properties = Self::crop_properties(year, &selection.provenance);
        properties.push(OutputProperty::reduced("PIXEL_COUNT", "sum"));
        properties.push(OutputProperty::reduced("PIXEL_TOTAL", "count"));

        ExportJob {
            collection: self.fields(&self.config.regional.state),
            image: ImageSpec::single(self.layer(selection, None)),
            reducer: Reducer::ModeWithCoverage,
            projection: Projection::NativeOf {
                image_id: selection.image_id.clone(),
            },
            properties,
            destination: Self::destination(&self.config.export, &id),
            file_format: FileFormat::Csv,
            description: id,
        }
    }

    /// Zonal mode of the regional-over-CDL mosaic.
    pub fn composite(&self, year: Year, selection: &CompositeSelection) -> ExportJob {
        let id = self.composite_export_id(year);
        let mut layers = Vec::with_capacity(2);
        if let Some(regional) = &selection.regional {
            layers.push(self.layer(regional, None));
        }
        layers.push(self.cdl_layer(&selection.cdl, year));

        ExportJob {
            collection: self.fields(&self.config.regional.state),
            image: ImageSpec::Mosaic { layers },
            reducer: Reducer::Mode,
            projection: Projection::NativeOf {
                image_id: selection.projection_image.clone(),
            },
            properties: Self::crop_properties(year, &selection.provenance),
            destination: Self::destination(&self.config.export, &id),
            file_format: FileFormat::Csv,
            description: id,
        }
    }

    /// Landsat pixel count of every field in one UTM zone.
    pub fn pixel_count(&self, state: &str, zone: u8) -> ExportJob {
        let id = pixel_count_export_id(state, zone);
        let zone_text = format!("{:02}", zone);

        ExportJob {
            collection: FeatureSource {
                asset_id: self.config.fields.collection(state),
                filter: Some(PropertyFilter::StartsWith {
                    property: "MGRS_TILE".to_string(),
                    prefix: zone_text.clone(),
                }),
            },
            image: ImageSpec::Constant { value: 1 },
            reducer: Reducer::Sum,
            projection: Projection::Explicit {
                crs: format!("EPSG:326{}", zone_text),
                transform: self.config.pixel_count.transform(),
            },
            properties: vec![
                OutputProperty::feature("OPENET_ID"),
                OutputProperty::reduced("PIXELCOUNT", "sum"),
                OutputProperty::constant("UTM_ZONE", zone_text),
            ],
            destination: Self::destination(&self.config.pixel_count.location(), &id),
            file_format: FileFormat::Csv,
            description: id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageTable;
    use crate::selector::SourceSelector;
    use compute::PropertyValue;
    use test_utils::{SAMPLE_CONFIG, SAMPLE_REMAP_CSV};

    fn fixtures() -> (CropTypeConfig, RemapTable) {
        (
            CropTypeConfig::from_yaml(SAMPLE_CONFIG).unwrap(),
            RemapTable::from_reader(SAMPLE_REMAP_CSV.as_bytes()).unwrap(),
        )
    }

    #[test]
    fn test_export_ids() {
        assert_eq!(cdl_export_id("ND", 1997), "nd_cdl_1997");
        assert_eq!(pixel_count_export_id("CA", 10), "ca_landsat_utm10");
        let (config, remap) = fixtures();
        let builder = JobBuilder::new(&config, &remap);
        assert_eq!(builder.regional_export_id(2020), "ca_landiq_2020");
        assert_eq!(builder.composite_export_id(2020), "ca_composite_2020");
    }

    #[test]
    fn test_cdl_job() {
        let (config, remap) = fixtures();
        let coverage = CoverageTable::from_config(&config);
        let selection = SourceSelector::new(&config, &coverage).cdl("ND", 2027).unwrap();
        let job = JobBuilder::new(&config, &remap).cdl("ND", 2027, &selection);

        assert_eq!(job.id(), "nd_cdl_2027");
        assert_eq!(job.destination.bucket, "openet_geodatabase");
        assert_eq!(job.destination.file_prefix, "temp_croptype_20250414/nd_cdl_2027");
        assert_eq!(job.collection.asset_id, "projects/openet/assets/features/fields/temp/ND");

        let layer = &job.image.layers()[0];
        assert_eq!(layer.band.as_deref(), Some("cropland"));
        assert_eq!(layer.mask_values, vec![81]);
        assert_eq!(layer.remap.as_ref().unwrap().from.len(), 255);
        let rule = layer.landcover_override.as_ref().unwrap();
        assert_eq!((rule.from_code, rule.to_code, rule.year), (176, 37, 2023));

        assert_eq!(
            job.properties[2].value,
            PropertyValue::Constant("USDA/NASS/CDL/2024 - remapped annual crops".to_string())
        );
    }

    #[test]
    fn test_native_cdl_job_not_remapped() {
        let (config, remap) = fixtures();
        let coverage = CoverageTable::from_config(&config);
        let selection = SourceSelector::new(&config, &coverage).cdl("ND", 1997).unwrap();
        let job = JobBuilder::new(&config, &remap).cdl("ND", 1997, &selection);
        assert!(job.image.layers()[0].remap.is_none());
    }

    #[test]
    fn test_regional_job_has_coverage_columns() {
        let (config, remap) = fixtures();
        let coverage = CoverageTable::from_config(&config);
        let selection = SourceSelector::new(&config, &coverage)
            .regional(2012)
            .unwrap()
            .unwrap();
        let job = JobBuilder::new(&config, &remap).regional(2012, &selection);

        assert_eq!(job.reducer, Reducer::ModeWithCoverage);
        let names: Vec<&str> = job.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["OPENET_ID", "CROP_2012", "CSRC_2012", "PIXEL_COUNT", "PIXEL_TOTAL"]
        );
        assert_eq!(job.image.layers()[0].mask_values, vec![82, 87]);
        assert!(job.image.layers()[0].landcover_override.is_none());
    }

    #[test]
    fn test_composite_layers_regional_on_top() {
        let (config, remap) = fixtures();
        let coverage = CoverageTable::from_config(&config);
        let selector = SourceSelector::new(&config, &coverage);
        let builder = JobBuilder::new(&config, &remap);

        let job = builder.composite(2020, &selector.composite(2020).unwrap().unwrap());
        let layers = job.image.layers();
        assert_eq!(layers.len(), 2);
        assert!(layers[0].image_id.contains("california"));
        assert!(layers[1].landcover_override.is_some());

        let early = builder.composite(2008, &selector.composite(2008).unwrap().unwrap());
        assert_eq!(early.image.layers().len(), 1);
        assert_eq!(
            early.projection,
            Projection::NativeOf {
                image_id: "projects/openet/assets/crop_type/california/2014".to_string()
            }
        );
    }

    #[test]
    fn test_pixel_count_job() {
        let (config, remap) = fixtures();
        let job = JobBuilder::new(&config, &remap).pixel_count("CA", 11);

        assert_eq!(job.id(), "ca_landsat_utm11");
        assert_eq!(job.destination.bucket, "openet");
        assert_eq!(job.destination.file_prefix, "crop_type/pixelcount/ca_landsat_utm11");
        assert_eq!(
            job.projection,
            Projection::Explicit {
                crs: "EPSG:32611".to_string(),
                transform: [30.0, 0.0, 15.0, 0.0, -30.0, 15.0],
            }
        );
        assert_eq!(
            job.collection.filter,
            Some(PropertyFilter::StartsWith {
                property: "MGRS_TILE".to_string(),
                prefix: "11".to_string(),
            })
        );
    }
}
