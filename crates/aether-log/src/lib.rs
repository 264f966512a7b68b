//! Structured logging and tracing for the Aether atmosphere renderer.
//!
//! Provides structured, span-based, filterable logging via the `tracing` ecosystem.
//! Supports console output with timestamps and module paths, plus JSON file logging
//! in debug builds for post-mortem analysis. Integrates with the configuration system
//! to allow runtime log level control.

use aether_config::Config;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::{Format, Json, JsonFields};
use tracing_subscriber::fmt::time::Uptime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config provide one.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "aether.log";

/// Install the global subscriber: an uptime-stamped console layer and, when
/// `debug_build` is set and `log_dir` is given, a JSON layer writing
/// [`LOG_FILE_NAME`] inside `log_dir`.
///
/// `RUST_LOG` takes precedence over `config.debug.log_level`. A log file that
/// cannot be opened is reported through the console layer and skipped.
///
/// ```no_run
/// use aether_config::Config;
/// use std::path::Path;
///
/// let config = Config::default();
/// aether_log::init_logging(Some(Path::new("logs")), cfg!(debug_assertions), Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);

    // RUST_LOG wins over the configured level.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // LUT workers run on scoped threads
        .with_timer(fmt::time::uptime());

    let mut open_error = None;
    let file_layer = log_dir
        .filter(|_| debug_build)
        .and_then(|dir| match open_log_file(dir) {
            Ok(file) => Some(json_file_layer(file)),
            Err(err) => {
                open_error = Some((dir.join(LOG_FILE_NAME), err));
                None
            }
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some((path, err)) = open_error {
        tracing::warn!(path = %path.display(), error = %err, "JSON log file disabled");
    }
}

/// Create `log_dir` if needed and truncate [`LOG_FILE_NAME`] inside it.
pub fn open_log_file(log_dir: &Path) -> io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    File::create(log_dir.join(LOG_FILE_NAME))
}

type JsonFileLayer<S> = fmt::Layer<S, JsonFields, Format<Json, Uptime>, File>;

/// One JSON object per event, without ANSI escapes.
fn json_file_layer<S>(file: File) -> JsonFileLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json()
}

/// Resolve the filter directive from an optional config.
///
/// An empty `debug.log_level` falls back to [`DEFAULT_FILTER`]. A bare level
/// such as `"debug"` keeps the GPU stack quiet.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => {
            let level = config.debug.log_level.trim();
            if level.contains('=') || level.contains(',') {
                level.to_string()
            } else {
                format!("{level},wgpu=warn,naga=warn")
            }
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
