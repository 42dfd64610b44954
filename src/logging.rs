//! Tracing configuration and log routing.
//!
//! Logs go to stdout with a compact formatter and are appended to a log file. When
//! `DOCSUM_LOG_FILE` is set that path is used; otherwise the file is `logs/app.log`. File lines
//! carry the source file so failures in a pipeline stage can be traced back without stdout.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "app.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Keeps the non-blocking writer alive for the process lifetime through a global guard.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non-blocking, appending writer for file logging.
///
/// Returns `None` when the log directory cannot be created or the file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    let (directory, file_name) = match std::env::var("DOCSUM_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let path = Path::new(&path);
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            let file_name = path.file_name()?.to_os_string();
            (directory, file_name)
        }
        _ => (DEFAULT_LOG_DIR.into(), DEFAULT_LOG_FILE.into()),
    };

    if let Err(err) = std::fs::create_dir_all(&directory) {
        eprintln!(
            "Failed to create log directory {}: {err}",
            directory.display()
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
