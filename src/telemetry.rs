use crate::errors::{ScopeError, ScopeResult};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub const LOG_FILE_PREFIX: &str = "timescope.log";

/// Installs a JSON subscriber writing daily-rolled files under `log_dir`.
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(log_dir: &Path) -> ScopeResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| ScopeError::Io(error.to_string()))
}
