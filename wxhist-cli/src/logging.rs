use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use chrono::Local;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_PREFIX: &str = "wxhist";

/// Send diagnostics to stderr so stdout carries only results, and to a fresh
/// file under `log_dir` when one is configured.
///
/// `RUST_LOG` wins over `default_filter`; an unparsable filter falls back to `info`.
/// Returns the path of the log file, if any.
pub fn init(default_filter: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = log_dir.map(open_log_file).transpose()?;
    let file_layer = log_file
        .as_ref()
        .map(|(_, file)| fmt::layer().with_writer(Arc::clone(file)).with_ansi(false));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();

    Ok(log_file.map(|(path, _)| path))
}

/// Create `dir` if needed and open `wxhist_<YYYYmmdd_HHMMSS>.log` inside it.
fn open_log_file(dir: &Path) -> anyhow::Result<(PathBuf, Arc<File>)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{LOG_FILE_PREFIX}_{stamp}.log"));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;

    Ok((path, Arc::new(file)))
}
