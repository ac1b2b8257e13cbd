//! Logstash shipping over TCP with the `json_lines` codec.
//!
//! Records are formatted on the calling task and pushed into a bounded channel.
//! A single background task owns the TCP connection, connecting lazily and
//! reconnecting on the next record after a write failure. A full channel drops
//! the record. Closing the sink lets the task drain what is queued and exit.

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{LogRecord, LogSink};

/// Lines buffered between request handlers and the shipper task.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on a single connection attempt to the aggregator.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds the Logstash envelope for a record.
#[derive(Debug, Clone)]
pub struct LogstashFormatter {
    service: String,
    host: String,
}

impl LogstashFormatter {
    pub fn new(service: impl Into<String>) -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        Self::with_host(service, host)
    }

    pub fn with_host(service: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            host: host.into(),
        }
    }

    /// One newline-terminated JSON line.
    ///
    /// Record fields sit at the top level next to the envelope keys; on a name
    /// clash the envelope wins.
    pub fn format(&self, record: &LogRecord, timestamp: DateTime<Utc>) -> String {
        let mut line = record.to_object();
        line.insert(
            "@timestamp".into(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        line.insert("type".into(), Value::String(self.service.clone()));
        line.insert("service".into(), Value::String(self.service.clone()));
        line.insert("level".into(), Value::String(record.level.as_str().to_string()));
        line.insert("host".into(), Value::String(self.host.clone()));
        line.insert("message".into(), Value::String(record.summary().to_string()));

        let mut rendered = Value::Object(line).to_string();
        rendered.push('\n');
        rendered
    }
}

/// Sink that ships formatted lines to a Logstash TCP input.
#[derive(Debug)]
pub struct LogstashSink {
    formatter: LogstashFormatter,
    tx: Mutex<Option<mpsc::Sender<String>>>,
    shipper: Mutex<Option<JoinHandle<()>>>,
}

impl LogstashSink {
    /// Start the shipper task for `address` (`host:port`).
    pub fn spawn(address: String, formatter: LogstashFormatter, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shipper = tokio::spawn(ship(address, rx));
        Self {
            formatter,
            tx: Mutex::new(Some(tx)),
            shipper: Mutex::new(Some(shipper)),
        }
    }
}

impl LogSink for LogstashSink {
    fn emit(&self, record: &LogRecord) {
        let line = self.formatter.format(record, Utc::now());
        let guard = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(tx) = guard.as_ref() else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(line) {
            tracing::debug!(event = %record.event, "Logstash buffer full, dropping record");
        }
    }

    /// Drops the sender so the shipper exits once the queue is drained.
    fn close(&self) -> Option<JoinHandle<()>> {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.shipper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

async fn connect(address: &str) -> io::Result<TcpStream> {
    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect to Logstash timed out",
            ))
        })
}

async fn ship(address: String, mut rx: mpsc::Receiver<String>) {
    let mut stream: Option<TcpStream> = None;
    let mut reported_down = false;

    while let Some(line) = rx.recv().await {
        if stream.is_none() {
            match connect(&address).await {
                Ok(s) => {
                    if reported_down {
                        tracing::info!(address = %address, "Reconnected to Logstash");
                    }
                    reported_down = false;
                    stream = Some(s);
                }
                Err(e) => {
                    if !reported_down {
                        tracing::warn!(address = %address, error = %e, "Logstash unreachable, dropping records");
                        reported_down = true;
                    }
                    continue;
                }
            }
        }

        if let Some(conn) = stream.as_mut() {
            if let Err(e) = conn.write_all(line.as_bytes()).await {
                tracing::warn!(address = %address, error = %e, "Logstash write failed");
                reported_down = true;
                stream = None;
            }
        }
    }

    tracing::debug!(address = %address, "Logstash shipper stopped");
}
