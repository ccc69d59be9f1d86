//! Common fixtures for crop-type tests.

/// The configuration shipped in `config/crop_type.yaml`.
pub const SAMPLE_CONFIG: &str = include_str!("../../../config/crop_type.yaml");

/// The annual crop remap table shipped with the configuration.
pub const SAMPLE_REMAP_CSV: &str = include_str!("../../../config/cdl_annual_crop_remap_table.csv");

/// File name of the remap table, as referenced by `remap.table`.
pub const SAMPLE_REMAP_FILE: &str = "cdl_annual_crop_remap_table.csv";

/// Bucket and folder the sample configuration exports to.
pub mod export {
    pub const BUCKET: &str = "openet_geodatabase";
    pub const FOLDER: &str = "temp_croptype_20250414";
}

/// Bucket and folder of the sample pixel count exports.
pub mod pixel_count {
    pub const BUCKET: &str = "openet";
    pub const FOLDER: &str = "crop_type/pixelcount";
}

/// Common crop codes.
pub mod crops {
    /// Corn
    pub const CORN: i64 = 1;
    /// Alfalfa
    pub const ALFALFA: i64 = 36;
    /// Other hay/non alfalfa
    pub const OTHER_HAY: i64 = 37;
    /// Canonical annual crop after remapping
    pub const ANNUAL_CROP: i64 = 47;
    /// Grapes
    pub const GRAPES: i64 = 69;
    /// Almonds, used as a "prior value" in merge tests
    pub const ALMONDS: i64 = 75;
    /// Grassland/pasture
    pub const PASTURE: i64 = 176;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_files_present() {
        assert!(SAMPLE_CONFIG.contains("version:"));
        assert!(SAMPLE_CONFIG.contains(SAMPLE_REMAP_FILE));
        assert!(SAMPLE_REMAP_CSV.contains("IN,OUT"));
    }
}
