use lfp_bms::config::LoggingConfig;
use lfp_bms::logging::{
    LogContext, get_logger, get_logger_with_context, init_logging, most_verbose, parse_log_level,
};
use tracing::Level;

#[test]
fn parse_levels() {
    assert_eq!(parse_log_level("TRACE").unwrap(), Level::TRACE);
    assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
    assert_eq!(parse_log_level("WARNING").unwrap(), Level::WARN);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn most_verbose_level_wins() {
    assert_eq!(most_verbose(Level::INFO, Level::DEBUG), Level::DEBUG);
    assert_eq!(most_verbose(Level::ERROR, Level::WARN), Level::WARN);
}

#[test]
fn init_with_file_output_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "DEBUG".to_string(),
        file: dir.path().join("lfp-bms.log").to_string_lossy().to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };

    init_logging(&config).unwrap();
    init_logging(&config).unwrap();

    let logger = get_logger("test");
    logger.info("logging test line");
    let ctx = LogContext::new("soc").with_field("cell", "2".to_string());
    get_logger_with_context(ctx).debug("context line");
}
