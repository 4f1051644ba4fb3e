//! Structured logging setup for meetdesk
//!
//! Wraps `tracing-subscriber` so the binary and tests configure logging the
//! same way. Output goes to stderr, leaving stdout for replies and
//! machine-readable output.
//!
//! - Console output with pretty formatting (default)
//! - Optional JSON output
//! - `RUST_LOG` is respected; without it the driver and HTTP crates are
//!   quieted to `warn`
//! - Can only be initialized once per process
//!
//! # Example
//!
//! ```no_run
//! use meetdesk::util::logging;
//! use tracing::info;
//!
//! logging::init_from_env();
//! info!("Assistant started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Crates that are chatty at `debug` and rarely useful here
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "mongodb", "rustls"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for meetdesk's own events
    pub level: Level,

    /// Emit one JSON object per event instead of pretty text
    pub use_json: bool,

    /// Include the module target (e.g., meetdesk::directory)
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with source locations
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
        }
    }
}

/// Parses a log level, case-insensitively
///
/// Unknown strings fall back to `INFO` with a note on stderr.
///
/// ```
/// use meetdesk::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Debug"), Level::DEBUG);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn directive(spec: &str) -> Option<Directive> {
    spec.parse().ok()
}

/// Filter used when the subscriber is installed
fn build_filter(level: Level, rust_log_set: bool) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    if let Some(own) = directive(&format!("{}={}", crate::NAME, level)) {
        filter = filter.add_directive(own);
    }

    if !rust_log_set {
        for name in QUIET_CRATES {
            if let Some(quiet) = directive(&format!("{}=warn", name)) {
                filter = filter.add_directive(quiet);
            }
        }
    }

    filter
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level, env::var("RUST_LOG").is_ok());
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.use_json {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging was already initialized elsewhere: {}", e);
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Reads `MEETDESK_LOG_LEVEL` and `MEETDESK_LOG_JSON`
pub fn init_from_env() {
    init_logging(config_from_env());
}

fn config_from_env() -> LoggingConfig {
    let level = env::var("MEETDESK_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);

    let use_json = env::var("MEETDESK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    LoggingConfig {
        level,
        use_json,
        ..Default::default()
    }
}

/// Initializes logging at `level_str`, keeping `MEETDESK_LOG_JSON`
pub fn with_level(level_str: &str) {
    init_logging(LoggingConfig {
        level: parse_level(level_str),
        ..config_from_env()
    });
}
