//! # Logging
//!
//! Sets up `tracing` with a daily-rotated log file and, in debug mode, a
//! stdout mirror. `RUST_LOG` overrides the level chosen by `debug`.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{GridWatchError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns error if the log directory cannot be used or a subscriber is
/// already installed
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    let (dir, prefix, suffix) = split_log_path(&config.file);

    std::fs::create_dir_all(&dir)?;

    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .max_log_files(config.max_log_files)
        .build(&dir)
        .map_err(|e| {
            GridWatchError::Io(std::io::Error::other(format!(
                "Failed to create log file appender in {}: {}",
                dir.display(),
                e
            )))
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let mut layers: Vec<BoxedLayer> = vec![format_layer(file_writer, &config.format, false)];
    if config.debug {
        layers.push(format_layer(std::io::stdout, &config.format, true));
    }

    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| {
            GridWatchError::InvalidConfig(format!("Failed to install log subscriber: {}", e))
        })?;

    Ok(guard)
}

fn format_layer<W>(writer: W, format: &str, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        "json" => base.json().boxed(),
        "compact" => base.compact().boxed(),
        _ => base.boxed(),
    }
}

/// Split `logs/grid-watch.log` into (`logs`, `grid-watch`, `log`)
fn split_log_path(path: &Path) -> (PathBuf, String, String) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "grid-watch".to_string());
    let suffix = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    (dir, prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, prefix, suffix) = split_log_path(Path::new("/var/log/grid/watch.txt"));
        assert_eq!(dir, PathBuf::from("/var/log/grid"));
        assert_eq!(prefix, "watch");
        assert_eq!(suffix, "txt");
    }

    #[test]
    fn test_split_bare_file_name() {
        let (dir, prefix, suffix) = split_log_path(Path::new("app"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "app");
        assert_eq!(suffix, "log");
    }
}
