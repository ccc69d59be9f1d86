//! Common types and utilities shared across the field crop-type tools.

pub mod cli;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod mgrs;
pub mod selection;

pub use cli::{CommonArgs, RemoteArgs, YearArgs};
pub use credentials::Credentials;
pub use error::{FieldError, FieldResult};
pub use logging::init_tracing;
pub use mgrs::utm_zone;
pub use selection::{parse_states, parse_years, Year, YearRange, ALL_STATES};
