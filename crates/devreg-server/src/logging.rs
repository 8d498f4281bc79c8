//! Logging initialization.
//!
//! - **Production**: JSON lines to a daily rolling file plus compact stdout
//! - **Development**: pretty stdout with span events
//!
//! The filter comes from `RUST_LOG`, falling back to `DEVREG_LOG_LEVEL`
//! and then `info`.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the fallback filter directive.
pub const LOG_LEVEL_ENV: &str = "DEVREG_LOG_LEVEL";

/// Environment variable overriding the production log directory.
pub const LOG_DIR_ENV: &str = "DEVREG_LOG_DIR";

/// File name prefix of rolled log files.
const LOG_FILE_PREFIX: &str = "devreg";

// Writers flush on drop, so the guards live for the whole process.
static GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is malformed or the log
/// directory cannot be created.
pub fn init(production: bool) -> anyhow::Result<()> {
    let filter = env_filter()?;
    if production {
        init_production(filter)
    } else {
        init_development(filter);
        Ok(())
    }
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    Ok(EnvFilter::try_new(directive)?)
}

fn init_production(filter: EnvFilter) -> anyhow::Result<()> {
    let dir = log_directory();
    std::fs::create_dir_all(&dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    if !keep_guards(file_guard, stdout_guard) {
        tracing::warn!("log writer guards already installed, dropping the new pair");
    }
    tracing::info!(log_dir = %dir.display(), "file logging enabled");
    Ok(())
}

/// Park the writer guards for the rest of the process.
///
/// Returns `false` when a pair is already parked. The rejected guards are
/// dropped, which flushes and closes their writers.
fn keep_guards(file_guard: WorkerGuard, stdout_guard: WorkerGuard) -> bool {
    GUARDS.set((file_guard, stdout_guard)).is_ok()
}

fn init_development(filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();
}

/// Directory for rolled log files.
///
/// `DEVREG_LOG_DIR` wins; otherwise `/var/log/devreg` on Linux and the
/// platform data directory elsewhere.
fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if cfg!(target_os = "linux") {
        PathBuf::from("/var/log/devreg")
    } else {
        directories::ProjectDirs::from("", "", "devreg")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
