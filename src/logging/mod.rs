//! Logging infrastructure - structured tracing for registry bookkeeping
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log level and format
//! - Zero-cost when disabled
//! - Console or daily-rolling file output

use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the file writer flushing for the process lifetime
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Directory for a daily rolling log file (console when `None`)
    pub log_dir: Option<String>,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            log_dir: None,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GCPTR_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("GCPTR_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        // GCPTR_LOG_FORMAT: pretty, compact, json
        if let Ok(format_str) = std::env::var("GCPTR_LOG_FORMAT") {
            config.format = match format_str.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }

        // GCPTR_LOG_FILE: directory for rolling log files
        if let Ok(dir) = std::env::var("GCPTR_LOG_FILE") {
            config.log_dir = Some(dir);
        }

        config.show_spans = std::env::var("GCPTR_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for debugging bookkeeping issues
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            log_dir: None,
            show_spans: true,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration (first call wins)
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("gcptr={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer: Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync> =
            match &config.log_dir {
                Some(dir) => {
                    let appender = tracing_appender::rolling::daily(dir, "gcptr.log");
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let _ = FILE_GUARD.set(guard);
                    format_layer(config.format, writer, span_events)
                        .with_filter(env_filter)
                        .boxed()
                }
                None => format_layer(config.format, io::stdout, span_events)
                    .with_filter(env_filter)
                    .boxed(),
            };

        // Ignore error if another subscriber is already installed
        tracing_subscriber::registry().with(layer).try_init().ok();
    });
}

fn format_layer<W>(
    format: LogFormat,
    writer: W,
    span_events: FmtSpan,
) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events)
        .with_target(true);

    match format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    }
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Registry-specific logging functions
// ============================================================================

/// Log a record upsert
#[inline]
pub fn log_register(address: *const u8, refcount: usize, inserted: bool) {
    trace!(
        event = "register",
        address = ?address,
        refcount,
        inserted,
        "Allocation registered"
    );
}

/// Log a refcount decrement
#[inline]
pub fn log_release(address: *const u8, refcount: usize) {
    trace!(
        event = "release",
        address = ?address,
        refcount,
        "Reference released"
    );
}

/// Log an allocation handed back to the allocator
#[inline]
pub fn log_free(address: *const u8, len: usize) {
    trace!(
        event = "free",
        address = ?address,
        len,
        "Allocation freed"
    );
}

/// Log sweep completion
pub fn log_sweep(freed: usize, remaining: usize) {
    debug!(
        event = "sweep",
        records_freed = freed,
        records_remaining = remaining,
        "Sweep complete"
    );
}

/// Report a decrement for an unknown address (never raised)
pub fn log_record_not_found(address: *const u8) {
    error!(
        event = "record_not_found",
        address = ?address,
        "Unable to find record for pointer address"
    );
}

/// Log creation of a per-type global registry
pub fn log_registry_created(type_name: &str, capacity: usize) {
    debug!(
        event = "registry_created",
        element_type = type_name,
        capacity,
        "Global registry created"
    );
}

/// Log exit-time teardown of a registry
pub fn log_shutdown(type_name: &str, records: usize) {
    info!(
        event = "shutdown",
        element_type = type_name,
        records,
        "Releasing outstanding records"
    );
}
