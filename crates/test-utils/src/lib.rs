//! Shared test utilities for the field crop-type workspace.
//!
//! This crate provides common testing infrastructure including:
//! - The sample configuration and remap table shipped in `config/`
//! - Builders for exported result tables
//! - A temporary workspace with seeded field datasets
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{ResultTable, TestWorkspace, SAMPLE_CONFIG};
//! ```

pub mod fixtures;
pub mod paths;
pub mod tables;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use paths::*;
pub use tables::*;
