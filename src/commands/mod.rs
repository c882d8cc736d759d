use std::path::Path;

use tokio::runtime::Runtime;

use crate::logging;

pub mod ask;
pub mod check;
pub mod config;

/// Loads the env file, installs tracing and builds the runtime.
///
/// The env file is applied before any runtime thread exists.
pub fn prepare(env_file: Option<&Path>, verbose: bool) -> Result<Runtime, String> {
    let loaded = crate::config::load_env_file(env_file)?;
    logging::init_tracing(verbose);
    if let Some(path) = loaded {
        tracing::debug!(path = %path.display(), "loaded env file");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start async runtime: {err}"))
}
