//! Tracing subscriber setup shared by the command line tools.

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `--debug` selects DEBUG and the
/// default is INFO. HTTP and database internals stay at INFO/WARN.
pub fn init_tracing(debug: bool, json: bool) -> Result<(), SetGlobalDefaultError> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=info,reqwest=info,sqlx=warn", level))
    });

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(debug);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}
