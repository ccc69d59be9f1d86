//! Temporary workspace helpers.
//!
//! A [`TestWorkspace`] mirrors the on-disk layout the tools expect: a
//! config directory, `fields/{STATE}/{STATE}.sqlite` datasets and the
//! `csv/` result cache.

use std::path::{Path, PathBuf};

use field_common::FieldResult;
use storage::FieldDataset;
use tempfile::TempDir;

use crate::fixtures::{SAMPLE_CONFIG, SAMPLE_REMAP_CSV, SAMPLE_REMAP_FILE};

/// Returns the workspace root directory of this repository.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// The shipped config directory.
pub fn config_dir() -> PathBuf {
    workspace_root().join("config")
}

/// A temporary tool workspace, removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace with the sample config in `config/`.
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("config");
        std::fs::create_dir_all(&config)?;
        std::fs::write(config.join("crop_type.yaml"), SAMPLE_CONFIG)?;
        std::fs::write(config.join(SAMPLE_REMAP_FILE), SAMPLE_REMAP_CSV)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.dir.path().join("csv")
    }

    pub fn dataset_path(&self, state: &str) -> PathBuf {
        FieldDataset::path_for(self.dir.path(), state)
    }

    /// Create a state dataset holding `features` as (id, MGRS tile) pairs.
    pub async fn seed_dataset(
        &self,
        state: &str,
        features: &[(&str, Option<&str>)],
    ) -> FieldResult<FieldDataset> {
        let dataset = FieldDataset::create(&self.dataset_path(state)).await?;
        for (id, tile) in features {
            dataset.insert_feature(id, *tile).await?;
        }
        Ok(dataset)
    }

    /// Place a result table in the local `csv/` cache.
    pub fn cache_table(&self, export_id: &str, contents: &str) -> std::io::Result<PathBuf> {
        let dir = self.csv_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.csv", export_id));
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}
