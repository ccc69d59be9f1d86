//! Merging exported result tables into field datasets.

use bytes::Bytes;
use crop_type::{CropTypeUpdater, PixelCountUpdater, ResultCache, Tables};
use storage::{CropValue, FieldDataset, ObjectStorage, StoragePath};
use test_utils::{crops, export, pixel_count, PixelCountTable, ResultTable, TestWorkspace};

fn tables(workspace: &TestWorkspace) -> Tables {
    Tables::load(&workspace.config_dir()).unwrap()
}

fn cache(workspace: &TestWorkspace) -> ResultCache {
    ResultCache::new(
        ObjectStorage::in_memory(export::BUCKET),
        export::FOLDER,
        workspace.path(),
    )
}

#[tokio::test]
async fn test_zero_result_keeps_existing_value() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace.seed_dataset("ND", &[("ND_1", None)]).await.unwrap();
    let prior = CropValue::new(150, "USDA/NASS/CDL/2019");
    dataset.set_crop("ND_1", 2019, &prior).await.unwrap();

    workspace
        .cache_table(
            "nd_cdl_2019",
            &ResultTable::new(2019).row("ND_1", "0", "USDA/NASS/CDL/2019").build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, false)
        .update_state(&dataset, "ND", &[2019])
        .await
        .unwrap();

    assert_eq!(update.stats.skipped_zero, 1);
    assert_eq!(dataset.crop("ND_1", 2019).await.unwrap(), Some(prior));
}

#[tokio::test]
async fn test_existing_value_kept_without_overwrite() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace
        .seed_dataset("ND", &[("ND_1", None), ("ND_2", None)])
        .await
        .unwrap();
    let prior = CropValue::new(crops::ALMONDS, "USDA/NASS/CDL/2019");
    dataset.set_crop("ND_1", 2019, &prior).await.unwrap();

    workspace
        .cache_table(
            "nd_cdl_2019",
            &ResultTable::new(2019)
                .row("ND_1", "1", "USDA/NASS/CDL/2019")
                .row("ND_2", "1.0", "USDA/NASS/CDL/2019")
                .row("ND_3", "1", "USDA/NASS/CDL/2019")
                .build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let updater = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, false);
    let update = updater.update_state(&dataset, "ND", &[2019]).await.unwrap();

    assert_eq!(update.stats.written, 1);
    assert_eq!(update.stats.kept_existing, 1);
    assert_eq!(update.stats.unknown_ids, 1);
    assert_eq!(dataset.crop("ND_1", 2019).await.unwrap(), Some(prior));
    assert_eq!(
        dataset.crop("ND_2", 2019).await.unwrap(),
        Some(CropValue::new(crops::CORN, "USDA/NASS/CDL/2019"))
    );

    // A second run changes nothing
    let again = updater.update_state(&dataset, "ND", &[2019]).await.unwrap();
    assert_eq!(again.stats.written, 0);
    assert_eq!(dataset.feature_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_overwrite_clear_resets_values_a_zero_result_cannot_replace() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace.seed_dataset("ND", &[("ND_1", None)]).await.unwrap();
    let prior = CropValue::new(150, "USDA/NASS/CDL/2019");
    dataset.set_crop("ND_1", 2019, &prior).await.unwrap();
    dataset.set_crop("ND_1", 2018, &prior).await.unwrap();

    workspace
        .cache_table(
            "nd_cdl_2019",
            &ResultTable::new(2019).row("ND_1", "0", "USDA/NASS/CDL/2019").build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, true)
        .update_state(&dataset, "ND", &[2019])
        .await
        .unwrap();

    assert!(update.cleared);
    assert_eq!(update.stats.skipped_zero, 1);
    assert_eq!(update.stats.written, 0);
    assert_eq!(dataset.crop("ND_1", 2019).await.unwrap(), Some(CropValue::default()));
    // Years outside the selection are not cleared
    assert_eq!(dataset.crop("ND_1", 2018).await.unwrap(), Some(prior));
}

#[tokio::test]
async fn test_uncovered_years_are_not_merged() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace.seed_dataset("CO", &[("CO_1", None)]).await.unwrap();

    workspace
        .cache_table(
            "co_cdl_2005",
            &ResultTable::new(2005).row("CO_1", "1", "USDA/NASS/CDL/2008").build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, false)
        .update_state(&dataset, "CO", &[2005])
        .await
        .unwrap();

    assert_eq!(update.tables, 0);
    assert_eq!(dataset.crop("CO_1", 2005).await.unwrap(), Some(CropValue::default()));
}

#[tokio::test]
async fn test_missing_table_downloaded_from_bucket() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace.seed_dataset("ND", &[("ND_1", None)]).await.unwrap();

    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let csv = ResultTable::new(2010).row("ND_1", "5", "USDA/NASS/CDL/2010").build();
    bucket
        .put(
            &StoragePath::export_file(export::FOLDER, "nd_cdl_2010", "csv"),
            Bytes::from(csv),
        )
        .await
        .unwrap();
    let cache = ResultCache::new(bucket, export::FOLDER, workspace.path());

    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, false)
        .update_state(&dataset, "ND", &[2010, 2011])
        .await
        .unwrap();

    assert_eq!(update.tables, 1);
    assert_eq!(update.missing_tables, 1);
    assert!(workspace.csv_dir().join("nd_cdl_2010.csv").is_file());
    assert_eq!(dataset.crop("ND_1", 2010).await.unwrap().unwrap().crop, 5);
}

#[tokio::test]
async fn test_low_coverage_never_merged_even_with_overwrite() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace
        .seed_dataset("CA", &[("CA_1", None), ("CA_2", None)])
        .await
        .unwrap();

    let source = "projects/openet/assets/crop_type/california/2020";
    workspace
        .cache_table(
            "ca_landiq_2020",
            &ResultTable::with_coverage(2020)
                .covered_row("CA_1", crops::GRAPES, source, 40.0, 100.0)
                .covered_row("CA_2", crops::GRAPES, source, 60.0, 100.0)
                .build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, true)
        .update_state(&dataset, "CA", &[2020])
        .await
        .unwrap();

    assert!(update.cleared);
    assert_eq!(update.stats.low_coverage, 1);
    assert_eq!(dataset.crop("CA_1", 2020).await.unwrap(), Some(CropValue::default()));
    assert_eq!(
        dataset.crop("CA_2", 2020).await.unwrap(),
        Some(CropValue::new(crops::GRAPES, source))
    );
}

#[tokio::test]
async fn test_composite_fills_regional_gaps() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace
        .seed_dataset("CA", &[("CA_1", None), ("CA_2", None)])
        .await
        .unwrap();

    let regional = "projects/openet/assets/crop_type/california/2020";
    let composite = "CA2020 CDL2020 composite - remapped annual crops";
    workspace
        .cache_table(
            "ca_landiq_2020",
            &ResultTable::with_coverage(2020)
                .covered_row("CA_1", crops::GRAPES, regional, 10.0, 10.0)
                .build(),
        )
        .unwrap();
    workspace
        .cache_table(
            "ca_composite_2020",
            &ResultTable::new(2020)
                .row("CA_1", "47", composite)
                .row("CA_2", "36", composite)
                .build(),
        )
        .unwrap();

    let cache = cache(&workspace);
    let update = CropTypeUpdater::new(&tables.config, &tables.coverage, &cache, false)
        .update_state(&dataset, "CA", &[2020])
        .await
        .unwrap();

    assert_eq!(update.tables, 2);
    assert_eq!(
        dataset.crop("CA_1", 2020).await.unwrap(),
        Some(CropValue::new(crops::GRAPES, regional))
    );
    assert_eq!(
        dataset.crop("CA_2", 2020).await.unwrap(),
        Some(CropValue::new(crops::ALFALFA, composite))
    );
}

#[tokio::test]
async fn test_reopened_dataset_keeps_values() {
    let workspace = TestWorkspace::new().unwrap();
    let dataset = workspace.seed_dataset("ND", &[("ND_1", None)]).await.unwrap();
    dataset
        .set_crop("ND_1", 1997, &CropValue::new(1, "USDA/NASS/CDL/1997"))
        .await
        .unwrap();
    dataset.close().await;

    let dataset = FieldDataset::open(&workspace.dataset_path("ND")).await.unwrap();
    assert!(dataset.years().await.contains(&1997));
    assert_eq!(dataset.crop("ND_1", 1997).await.unwrap().unwrap().crop, 1);
}

#[tokio::test]
async fn test_pixel_counts_merged_from_listed_zones() {
    let workspace = TestWorkspace::new().unwrap();
    let tables = tables(&workspace);
    let dataset = workspace
        .seed_dataset("CA", &[("CA_1", Some("10SFH")), ("CA_2", Some("11SKA"))])
        .await
        .unwrap();
    dataset.set_pixel_count("CA_2", 99).await.unwrap();

    let bucket = ObjectStorage::in_memory(pixel_count::BUCKET);
    for (zone, id, count) in [(10, "CA_1", "120.6"), (11, "CA_2", "")] {
        let path = StoragePath::export_file(
            pixel_count::FOLDER,
            &format!("ca_landsat_utm{}", zone),
            "csv",
        );
        let csv = PixelCountTable::new(zone).row(id, count).build();
        bucket.put(&path, Bytes::from(csv)).await.unwrap();
    }
    let listing = bucket.list_names(pixel_count::FOLDER).await.unwrap();
    let cache = ResultCache::new(bucket, pixel_count::FOLDER, workspace.path());

    let update = PixelCountUpdater::new(&tables.config, &cache, listing, true)
        .update_state(&dataset, "CA")
        .await
        .unwrap();

    assert_eq!(update.tables, 2);
    assert_eq!(update.written, 1);
    let features = dataset.features().await.unwrap();
    assert_eq!(features[0].pixel_count, 121);
    // Cleared by overwrite; the zone 11 value was not numeric
    assert_eq!(features[1].pixel_count, 0);
}
