//! Logging setup for LFP-BMS
//!
//! Console output plus an optional daily-rolling log file, both built on
//! `tracing-subscriber`. Components log through a [`StructuredLogger`]
//! obtained from [`get_logger`], which tags every line with its component.

use crate::config::LoggingConfig;
use crate::error::{BmsError, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Once;
use tracing::{Level, Subscriber, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod level;
mod structured;

pub use level::{most_verbose, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

// The file writer stops flushing once its guard drops
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Effective level per sink after applying the optional overrides
#[derive(Debug, Clone, Copy)]
struct SinkLevels {
    console: Level,
    file: Level,
}

impl SinkLevels {
    fn from_config(config: &LoggingConfig) -> Result<Self> {
        let base = parse_log_level(&config.level)?;
        let resolve = |over: &Option<String>| {
            over.as_deref()
                .and_then(|name| parse_log_level(name).ok())
                .unwrap_or(base)
        };
        Ok(Self {
            console: resolve(&config.console_level),
            file: resolve(&config.file_level),
        })
    }
}

/// Install the global subscriber. Only the first call does any work; later
/// calls report the outcome of the first.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT.call_once(|| {
        if let Err(e) = install(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    match INIT_ERROR.get() {
        Some(err) => Err(BmsError::config(err.clone())),
        None => Ok(()),
    }
}

fn install(config: &LoggingConfig) -> Result<()> {
    let levels = SinkLevels::from_config(config)?;
    let filter = env_filter(most_verbose(levels.console, levels.file));

    if file_logging_disabled() {
        // try_init: a test harness may already own the global subscriber
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer(std::io::stdout, config.json_format, levels.console))
            .try_init();
        info!(
            "Logging initialized: console {}, file output disabled",
            levels.console
        );
        return Ok(());
    }

    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("lfp-bms")
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(log_directory(Path::new(&config.file)))
        .map_err(|e| BmsError::io(format!("Failed to create log file appender: {}", e)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let console = config
        .console_output
        .then(|| fmt_layer(std::io::stdout, config.json_format, levels.console));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(file_writer, config.json_format, levels.file))
        .with(console)
        .try_init()
        .map_err(|e| BmsError::config(format!("Failed to install subscriber: {}", e)))?;

    info!(
        "Logging initialized: file {} at {}, console {}",
        config.file,
        levels.file,
        if config.console_output {
            levels.console.as_str()
        } else {
            "off"
        }
    );
    Ok(())
}

fn fmt_layer<S, W>(writer: W, json: bool, level: Level) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    let filter = LevelFilter::from_level(level);
    if json {
        base.json().with_filter(filter).boxed()
    } else {
        base.with_filter(filter).boxed()
    }
}

/// `RUST_LOG` wins; otherwise this crate at `level` and quiet HTTP tracing
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "lfp_bms={},tower_http=warn",
            level.as_str().to_lowercase()
        ))
    })
}

fn file_logging_disabled() -> bool {
    cfg!(test) || std::env::var_os("LFP_BMS_DISABLE_FILE_LOG").is_some()
}

/// `file` may name the log file itself or the directory holding it
fn log_directory(file: &Path) -> &Path {
    if file.extension().is_none() {
        return file;
    }
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_accepts_file_or_dir() {
        assert_eq!(
            log_directory(Path::new("/data/log/lfp-bms.log")),
            Path::new("/data/log")
        );
        assert_eq!(log_directory(Path::new("/var/log/bms")), Path::new("/var/log/bms"));
        assert_eq!(log_directory(Path::new("bms.log")), Path::new("."));
    }

    #[test]
    fn sink_overrides_fall_back_to_base_level() {
        let config = LoggingConfig {
            level: "WARN".to_string(),
            console_level: Some("debug".to_string()),
            file_level: Some("bogus".to_string()),
            ..LoggingConfig::default()
        };
        let levels = SinkLevels::from_config(&config).unwrap();
        assert_eq!(levels.console, Level::DEBUG);
        assert_eq!(levels.file, Level::WARN);
    }
}
