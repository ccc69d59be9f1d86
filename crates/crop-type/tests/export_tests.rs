//! Export planning against the in-memory compute service and bucket.

use std::sync::Arc;

use bytes::Bytes;
use compute::testing::FakeComputeService;
use compute::{JobSubmitter, PropertyValue};
use crop_type::{CropTypeError, CropTypeExporter, Tables};
use storage::{ObjectStorage, StoragePath};
use test_utils::{export, SAMPLE_CONFIG, SAMPLE_REMAP_CSV};

fn tables() -> Tables {
    Tables::from_yaml(SAMPLE_CONFIG, SAMPLE_REMAP_CSV).unwrap()
}

async fn snapshot(
    fake: &Arc<FakeComputeService>,
    bucket: &ObjectStorage,
    overwrite: bool,
) -> JobSubmitter {
    JobSubmitter::snapshot(fake.clone(), bucket, export::FOLDER, overwrite)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_nd_1997_exports_native_cdl() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    let result = CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "ND", &[1997])
        .await
        .unwrap();

    assert_eq!(result.submitted, 1);
    let jobs = fake.submitted();
    assert_eq!(jobs[0].id(), "nd_cdl_1997");
    assert_eq!(jobs[0].image.layers()[0].image_id, "USDA/NASS/CDL/1997");
    assert_eq!(
        jobs[0].properties[2].value,
        PropertyValue::Constant("USDA/NASS/CDL/1997".to_string())
    );
}

#[tokio::test]
async fn test_years_after_newest_cdl_use_remapped_image() {
    let mut tables = tables();
    tables.config.years.max = tables.config.cdl.native_years.max + 3;
    let year = tables.config.years.max;
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "NE", &[year])
        .await
        .unwrap();

    let job = &fake.submitted()[0];
    assert_eq!(job.image.layers()[0].image_id, "USDA/NASS/CDL/2024");
    assert!(job.image.layers()[0].remap.is_some());
    assert_eq!(
        job.properties[2].value,
        PropertyValue::Constant("USDA/NASS/CDL/2024 - remapped annual crops".to_string())
    );
}

#[tokio::test]
async fn test_active_task_is_skipped() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    fake.add_active("nd_cdl_2008");
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    let result = CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "ND", &[2008])
        .await
        .unwrap();

    assert_eq!(result.skipped, 1);
    assert!(fake.submitted().is_empty());
    assert!(fake.cancelled().is_empty());
    assert_eq!(submitter.summary().skipped_active, 1);
}

#[tokio::test]
async fn test_overwrite_cancels_active_task() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    let running = fake.add_active("nd_cdl_2008");
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, true).await;

    CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "ND", &[2008])
        .await
        .unwrap();

    assert_eq!(fake.cancelled(), vec![running.name]);
    assert_eq!(fake.submitted_ids(), vec!["nd_cdl_2008"]);
}

#[tokio::test]
async fn test_existing_output_is_skipped() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    bucket
        .put(
            &StoragePath::export_file(export::FOLDER, "il_cdl_2010", "csv"),
            Bytes::from_static(b"OPENET_ID\n"),
        )
        .await
        .unwrap();
    let mut submitter = snapshot(&fake, &bucket, false).await;

    CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "IL", &[2011, 2010])
        .await
        .unwrap();

    assert_eq!(fake.submitted_ids(), vec!["il_cdl_2011"]);
    assert_eq!(submitter.summary().skipped_existing, 1);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);

    let mut first = snapshot(&fake, &bucket, false).await;
    CropTypeExporter::new(&tables)
        .export_state(&mut first, "IA", &[2006, 2005])
        .await
        .unwrap();
    assert_eq!(fake.submitted().len(), 2);

    // Tasks from the first run are still active
    let mut second = snapshot(&fake, &bucket, false).await;
    let result = CropTypeExporter::new(&tables)
        .export_state(&mut second, "IA", &[2006, 2005])
        .await
        .unwrap();
    assert_eq!(result.submitted, 0);
    assert_eq!(fake.submitted().len(), 2);
}

#[tokio::test]
async fn test_invalid_split_source_is_fatal() {
    let mut tables = tables();
    tables
        .config
        .cdl
        .partial_coverage
        .get_mut(&2005)
        .unwrap()
        .push("ID".to_string());
    let tables = Tables::from_parts(tables.config, tables.remap);
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    let err = CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "ID", &[2005])
        .await
        .unwrap_err();

    assert!(matches!(err, CropTypeError::InvalidSource { year: 2005, .. }));
    assert!(fake.submitted().is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts() {
    let fake = Arc::new(FakeComputeService::new());
    fake.fail_listing(true);
    let bucket = ObjectStorage::in_memory(export::BUCKET);

    let result = JobSubmitter::snapshot(fake.clone(), &bucket, export::FOLDER, false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_submit_failure_aborts() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    fake.fail_submit(true);
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    let err = CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "ND", &[2010, 2009])
        .await
        .unwrap_err();
    assert!(matches!(err, CropTypeError::Compute(_)));
}

#[tokio::test]
async fn test_california_composite_uses_regional_projection() {
    let tables = tables();
    let fake = Arc::new(FakeComputeService::new());
    let bucket = ObjectStorage::in_memory(export::BUCKET);
    let mut submitter = snapshot(&fake, &bucket, false).await;

    CropTypeExporter::new(&tables)
        .export_state(&mut submitter, "CA", &[2017])
        .await
        .unwrap();

    let jobs = fake.submitted();
    assert_eq!(jobs.len(), 2);
    let composite = &jobs[1];
    assert_eq!(composite.id(), "ca_composite_2017");
    assert_eq!(
        composite.properties[2].value,
        PropertyValue::Constant("CA2016 CDL2017 composite - remapped annual crops".to_string())
    );
}
