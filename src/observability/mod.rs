//! Structured event log.
//!
//! Request handling code emits [`LogRecord`]s through an injected [`Logger`],
//! which fans each record out to every configured [`LogSink`]. Process
//! diagnostics (startup errors, shipper state) go through `tracing` directly.

pub mod logstash;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use self::logstash::{LogstashFormatter, LogstashSink};

/// Service identifier stamped on health responses and shipped log lines.
pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Severity of a structured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured event: a level, an event name, an optional human message and
/// arbitrary JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub event: String,
    pub message: Option<String>,
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            level,
            event: event.into(),
            message: None,
            fields: Map::new(),
        }
    }

    pub fn debug(event: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, event)
    }

    pub fn info(event: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, event)
    }

    pub fn warning(event: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, event)
    }

    pub fn error(event: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, event)
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Text used as the `message` of a shipped line: the message if set, else the event name.
    pub fn summary(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.event)
    }

    /// Fields as a JSON object, including `event` (and `message` when set).
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = self.fields.clone();
        object.insert("event".to_string(), Value::String(self.event.clone()));
        if let Some(message) = &self.message {
            object.insert("message".to_string(), Value::String(message.clone()));
        }
        object
    }
}

/// Destination for structured events.
///
/// `emit` is called on the request path and must not block.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);

    /// Stop accepting records. Sinks with a background task return its handle
    /// so the caller can wait for queued records to be written.
    fn close(&self) -> Option<JoinHandle<()>> {
        None
    }
}

/// Renders records through `tracing` so they reach the console subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let fields = Value::Object(record.fields.clone());
        let event = record.event.as_str();
        let message = record.summary();
        match record.level {
            LogLevel::Debug => tracing::debug!(event, fields = %fields, "{message}"),
            LogLevel::Info => tracing::info!(event, fields = %fields, "{message}"),
            LogLevel::Warning => tracing::warn!(event, fields = %fields, "{message}"),
            LogLevel::Error => tracing::error!(event, fields = %fields, "{message}"),
        }
    }
}

/// Keeps every record in memory. Used by tests to assert on emitted events.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Records whose event name equals `event`.
    pub fn events(&self, event: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event == event)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
    }
}

/// Cloneable handle that fans records out to every sink.
#[derive(Clone)]
pub struct Logger {
    sinks: Arc<[Arc<dyn LogSink>]>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Logger {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            sinks: sinks.into(),
        }
    }

    /// Console output plus, when `LOGSTASH_HOST` is set, a Logstash shipper.
    ///
    /// Must be called inside a tokio runtime when a Logstash host is configured.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(TracingSink)];

        if let Some(host) = &config.logstash_host {
            let address = format!("{host}:{}", config.logstash_port);
            tracing::info!(address = %address, "Shipping structured logs to Logstash");
            sinks.push(Arc::new(LogstashSink::spawn(
                address,
                LogstashFormatter::new(SERVICE_NAME),
                logstash::DEFAULT_CHANNEL_CAPACITY,
            )));
        }

        Self::new(sinks)
    }

    pub fn emit(&self, record: LogRecord) {
        for sink in self.sinks.iter() {
            sink.emit(&record);
        }
    }

    /// Close every sink and wait up to `grace` for each to flush.
    pub async fn shutdown(&self, grace: Duration) {
        for sink in self.sinks.iter() {
            let Some(handle) = sink.close() else {
                continue;
            };
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Log shipper task failed"),
                Err(_) => tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Log shipper did not drain before shutdown"
                ),
            }
        }
    }
}
