//! Logging setup for BitSend
//!
//! Diagnostics go through the `log` facade; this module only installs an
//! `env_logger` backend with the configured format. Operator-facing prompts
//! and summaries are not log records and never pass through here.
//!
//! Never log private keys or WIF strings. Addresses and transaction ids may
//! be logged, shortened with [`sanitize_for_logging`] at debug level and
//! above.
//!
//! # Usage
//!
//! ```
//! use bitsend_common::logging::{self, LogConfig};
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//! log::info!("payment session started");
//! ```

use chrono::Local;
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Once;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: LogLevel,
    /// Path to log file (None for stderr)
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_true")]
    pub include_timestamps: bool,
    /// One JSON object per record instead of plain text
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_file: None,
            include_timestamps: true,
            json_format: false,
        }
    }
}

fn default_level() -> LogLevel {
    LogLevel::Warn
}

fn default_true() -> bool {
    true
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

static LOGGING_INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Only the first call installs a logger; later calls return Ok and change
/// nothing. `RUST_LOG`, when set, overrides the configured level.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    let include_timestamps = config.include_timestamps;
    let json_format = config.json_format;
    let log_file = config.log_file.clone();
    let level = config.level;

    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level.into());
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            if json_format {
                let line = json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            } else {
                if include_timestamps {
                    write!(buf, "{} ", timestamp)?;
                }
                let mut style = buf.style();
                style.set_bold(true);
                writeln!(
                    buf,
                    "[{} {}] {}",
                    style.value(record.level()),
                    record.target(),
                    record.args()
                )
            }
        });

        if let Some(file_path) = &log_file {
            match OpenOptions::new().create(true).append(true).open(file_path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    // Keep logging to stderr; the caller still learns the file failed
                    result = Err(format!("Failed to open log file {}: {}", file_path, e));
                    builder.target(env_logger::Target::Stderr);
                }
            }
        }

        if let Err(e) = builder.try_init() {
            // Tests and embedding binaries may have installed a logger already
            debug!("Logger already initialized: {}", e);
        }
    });

    result
}

/// Shorten an address or transaction id for a log line
pub fn sanitize_for_logging(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "*****".to_string();
    }

    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", first, last)
}
