//! Object storage interface for exported result tables (Google Cloud Storage).

use std::collections::BTreeSet;
use std::path::Path as LocalPath;
use std::sync::Arc;

use bytes::Bytes;
use object_store::{gcp::GoogleCloudStorageBuilder, memory::InMemory, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use field_common::{Credentials, FieldError, FieldResult};

/// Configuration for a bucket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Bucket name
    pub bucket: String,
    /// Service account key file; application default credentials when unset
    #[serde(default)]
    pub service_account_path: Option<String>,
}

impl ObjectStorageConfig {
    pub fn new(bucket: impl Into<String>, credentials: &Credentials) -> Self {
        Self {
            bucket: bucket.into(),
            service_account_path: credentials
                .key_file()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

/// Object storage client for one bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

fn storage_error(action: &str, path: &str, err: object_store::Error) -> FieldError {
    match err {
        object_store::Error::NotFound { .. } => FieldError::NotFound(path.to_string()),
        e => FieldError::StorageError(format!("Failed to {} {}: {}", action, path, e)),
    }
}

impl ObjectStorage {
    /// Create a new Cloud Storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> FieldResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&config.bucket);

        if let Some(path) = &config.service_account_path {
            builder = builder.with_service_account_path(path);
        }

        let store = builder.build().map_err(|e| {
            FieldError::StorageError(format!("Failed to create GCS client: {}", e))
        })?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// In-memory bucket, used by tests and dry runs.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> FieldResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data)
            .await
            .map_err(|e| storage_error("write", path, e))?;

        Ok(())
    }

    /// Read bytes from a path.
    ///
    /// A missing object is reported as [`FieldError::NotFound`].
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> FieldResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| storage_error("read", path, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| storage_error("read", path, e))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> FieldResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(storage_error("check", path, e)),
        }
    }

    /// List object paths with a given prefix.
    pub async fn list(&self, prefix: &str) -> FieldResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| storage_error("list", prefix, e))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }

    /// File names directly under `folder`, without the folder prefix.
    ///
    /// This is the bucket snapshot used for "output already exists" checks.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn list_names(&self, folder: &str) -> FieldResult<BTreeSet<String>> {
        let folder = folder.trim_matches('/');
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };

        let names: BTreeSet<String> = self
            .list(folder)
            .await?
            .into_iter()
            .filter_map(|p| p.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect();

        debug!(count = names.len(), "Listed bucket folder");
        Ok(names)
    }

    /// Download an object to a local file, creating parent directories.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn download_to(&self, path: &str, dest: &LocalPath) -> FieldResult<u64> {
        let bytes = self.get(path).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;

        debug!(dest = ?dest, size = bytes.len(), "Downloaded object");
        Ok(bytes.len() as u64)
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> FieldResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| storage_error("delete", path, e))?;

        Ok(())
    }
}

/// Path builder for consistent bucket layout.
pub struct StoragePath;

impl StoragePath {
    /// Build the object path of an exported table.
    /// Format: {folder}/{export_id}.{ext}
    pub fn export_file(folder: &str, export_id: &str, extension: &str) -> String {
        let name = Self::export_name(export_id, extension);
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            name
        } else {
            format!("{}/{}", folder, name)
        }
    }

    /// File name of an exported table, as returned by `list_names`.
    pub fn export_name(export_id: &str, extension: &str) -> String {
        format!("{}.{}", export_id, extension.to_ascii_lowercase())
    }

    /// Export file name prefix handed to the remote export (no extension).
    pub fn export_prefix(folder: &str, export_id: &str) -> String {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            export_id.to_string()
        } else {
            format!("{}/{}", folder, export_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        assert_eq!(
            StoragePath::export_file("temp_croptype_20250414", "nd_cdl_1997", "CSV"),
            "temp_croptype_20250414/nd_cdl_1997.csv"
        );
        assert_eq!(StoragePath::export_file("", "nd_cdl_1997", "csv"), "nd_cdl_1997.csv");
        assert_eq!(
            StoragePath::export_prefix("crop_type/pixelcount/", "ca_landsat_utm10"),
            "crop_type/pixelcount/ca_landsat_utm10"
        );
    }

    #[tokio::test]
    async fn test_list_names_strips_folder() {
        let storage = ObjectStorage::in_memory("openet_geodatabase");
        storage
            .put("temp/nd_cdl_2008.csv", Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .put("temp/nd_cdl_2009.csv", Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .put("other/nd_cdl_2010.csv", Bytes::from_static(b"c"))
            .await
            .unwrap();

        let names = storage.list_names("temp").await.unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["nd_cdl_2008.csv", "nd_cdl_2009.csv"]
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = ObjectStorage::in_memory("bucket");
        let err = tokio_test::assert_err!(storage.get("temp/missing.csv").await);
        assert!(err.is_not_found());
        assert!(!storage.exists("temp/missing.csv").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_to_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ObjectStorage::in_memory("bucket");
        storage
            .put("temp/ca_cdl_2020.csv", Bytes::from_static(b"OPENET_ID\n"))
            .await
            .unwrap();

        let dest = dir.path().join("csv").join("ca_cdl_2020.csv");
        let size = storage.download_to("temp/ca_cdl_2020.csv", &dest).await.unwrap();
        assert_eq!(size, 10);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "OPENET_ID\n");
    }
}
