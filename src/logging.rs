//! Tracing subscriber setup for the `foundry` binary.
//!
//! Human-readable events go to stderr. When enabled, every event is also
//! written as one JSON object per line to `<log_dir>/foundry.log`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_FILE_NAME: &str = "foundry.log";

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "foundry=debug" } else { "foundry=info" }
}

/// `RUST_LOG` if set and valid, otherwise the crate-level default.
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process. A subscriber that is already installed is
/// left in place.
pub fn init(log_dir: &Path, verbose: bool, json_file: bool) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, guard) = if json_file {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    tracing::debug!(
        log_dir = %log_dir.display(),
        json_file,
        "tracing initialized"
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_verbosity() {
        assert_eq!(default_directive(false), "foundry=info");
        assert_eq!(default_directive(true), "foundry=debug");
    }

    #[test]
    fn test_init_creates_log_dir_for_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join(".foundry/logs");
        let guard = init(&log_dir, false, true).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_init_without_json_file_has_no_guard() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let guard = init(&log_dir, true, false).unwrap();
        assert!(guard.is_none());
        assert!(!log_dir.exists());
    }
}
