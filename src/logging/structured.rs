use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::Level;

/// Fields attached to every line from one logger
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Subsystem name, e.g. "soc", "protection", "web"
    pub component: String,
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// Component-scoped logger. The `fields` string is rendered once, when the
/// logger is built, and attached to each event.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    fields: String,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        let mut fields = format!("component={}", context.component);
        for (key, value) in &context.extra_fields {
            let _ = write!(fields, ",{}={}", key, value);
        }
        Self { fields }
    }

    pub fn fields(&self) -> &str {
        &self.fields
    }

    fn emit(&self, level: Level, message: &str) {
        let fields = self.fields.as_str();
        match level {
            Level::ERROR => tracing::error!(%fields, "{}", message),
            Level::WARN => tracing::warn!(%fields, "{}", message),
            Level::INFO => tracing::info!(%fields, "{}", message),
            Level::DEBUG => tracing::debug!(%fields, "{}", message),
            _ => tracing::trace!(%fields, "{}", message),
        }
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::TRACE, message);
    }
}

pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
