//! Command line arguments shared by every tool.
//!
//! Each binary flattens these into its own `Args` struct.

use std::path::PathBuf;

use clap::Args;

use crate::credentials::Credentials;
use crate::error::FieldResult;

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Comma/space separated list of states, or ALL
    #[arg(long, num_args = 1.., default_value = "ALL")]
    pub states: Vec<String>,

    /// Force overwrite of existing files and values
    #[arg(long)]
    pub overwrite: bool,

    /// Debug level logging
    #[arg(long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Configuration directory (contains crop_type.yaml and the remap table)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Workspace holding fields/<STATE>/<STATE>.sqlite and the csv/ cache
    #[arg(long, env = "FIELD_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct YearArgs {
    /// Comma/space separated years and/or ranges of years (default: all)
    #[arg(long, num_args = 1..)]
    pub years: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Service account JSON key file
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Cloud project id used when no key file is given
    #[arg(long)]
    pub project: Option<String>,
}

impl RemoteArgs {
    pub fn credentials(&self) -> FieldResult<Credentials> {
        Credentials::resolve(self.key.as_deref(), self.project.as_deref())
    }
}
