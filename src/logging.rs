use std::env;
use std::io;

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FORMAT_ENV: &str = "LIVEPROBE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "liveprobe=warn";

/// Initializes tracing on stderr so stdout stays machine-readable.
///
/// `LIVEPROBE_LOG_FORMAT=json` switches to JSON lines; anything else is the
/// pretty format. `RUST_LOG` overrides `default_filter`. `verbose` raises the
/// default to `liveprobe=debug`.
pub fn init_tracing(verbose: bool) {
    let format = env::var(LOG_FORMAT_ENV)
        .unwrap_or_else(|_| "pretty".to_string())
        .to_lowercase();

    let default_filter = if verbose {
        "liveprobe=debug"
    } else {
        DEFAULT_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding callers).
    let _ = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init(),
        _ => fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .try_init(),
    };
}
