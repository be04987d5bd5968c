//! Logging setup for the binary.
//!
//! Events go to stderr; with a log file configured they are also written as
//! JSON lines to a daily-rotated file by a background worker.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILE: &str = "gqlwire.log";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// The returned guard flushes the file writer when dropped, so keep it alive
/// for as long as the process logs.
pub fn init(verbose: bool, log_file: Option<PathBuf>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    let (file_layer, guard) = match log_file.as_deref().map(file_writer) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false).json()),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

/// Our own events at the chosen level; the GraphQL and HTTP stacks only
/// when they warn.
fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("gqlwire={},async_graphql=warn,axum=warn", level)
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let _ = std::fs::create_dir_all(directory);
    let file_name = path.file_name().unwrap_or(OsStr::new(DEFAULT_LOG_FILE));
    tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_directive() {
        assert_eq!(
            default_directive(false),
            "gqlwire=info,async_graphql=warn,axum=warn"
        );
        assert!(default_directive(true).starts_with("gqlwire=debug,"));
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }

    #[test]
    fn test_file_writer_creates_rotated_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("server.log");

        let (mut writer, guard) = file_writer(&path);
        writer.write_all(b"{\"message\":\"hello\"}\n").unwrap();
        drop(guard);

        let names: Vec<String> = std::fs::read_dir(temp_dir.path().join("logs"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("server.log"));
    }
}
