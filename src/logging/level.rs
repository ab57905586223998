use crate::error::{BmsError, Result};
use std::str::FromStr;
use tracing::Level;

/// Parse a level name, case-insensitive. `WARNING` is accepted for `WARN`.
pub fn parse_log_level(name: &str) -> Result<Level> {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case("warning") {
        return Ok(Level::WARN);
    }
    Level::from_str(trimmed).map_err(|_| BmsError::config(format!("Invalid log level: {}", name)))
}

/// The more verbose of two levels (`tracing` orders TRACE highest)
pub fn most_verbose(a: Level, b: Level) -> Level {
    a.max(b)
}
