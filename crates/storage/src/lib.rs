//! Storage abstractions for the field crop-type tools.
//!
//! Provides unified interfaces for:
//! - Object storage (Google Cloud Storage) holding exported result tables
//! - SQLite per-state field datasets holding the crop-type record

pub mod dataset;
pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, StoragePath};
pub use dataset::{CropValue, FieldDataset, FieldFeature};
