//! Tracing initialisation
//!
//! - Console: colored, compact
//! - File: daily rotation under the configured log directory
//!   (`mcphost.2026-01-22.log`), no colors, with file and line
//!
//! `RUST_LOG` takes precedence over the configured default level.

use mcphost_core::{branding, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Workspace crates logged at `debug` when `RUST_LOG` is unset
const WORKSPACE_TARGETS: &[&str] = &[
    "mcphost_core",
    "mcphost_storage",
    "mcphost_runtime",
    "mcphost",
];

/// Install the global subscriber.
///
/// Returns the file writer guard, which must be kept alive for the lifetime
/// of the program. `None` when file logging is disabled or unavailable.
/// Calling this twice is harmless; the second subscriber is not installed.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_writer, guard) = match config.log_dir.as_deref().map(file_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Warning: file logging disabled: {e}");
            (None, None)
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_target(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter(&config.default_level))
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}

/// `RUST_LOG` if set, otherwise `default_level` with debug for our crates
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base = EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"));
        WORKSPACE_TARGETS
            .iter()
            .filter_map(|target| format!("{target}=debug").parse::<Directive>().ok())
            .fold(base, EnvFilter::add_directive)
    })
}

fn file_appender(dir: &std::path::Path) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(branding::LOG_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| e.to_string())
}
