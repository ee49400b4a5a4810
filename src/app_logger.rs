//! Application log ring buffer.
//!
//! Holds the most recent structured log entries in memory. Server-side
//! warnings and errors are copied in by `RingBufferLayer`; the SPA pushes its
//! own entries over `POST /api/logs` and reads them back with `GET /api/logs`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const LOG_RING_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp_ms: i64,
    pub level: LogLevel,
    /// `"server"` for entries captured from tracing, otherwise whatever the
    /// client sent (`"contacts"`, `"keyboard"`, ...).
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Fixed-capacity buffer; the oldest entry is dropped when full.
pub struct LogRingBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
}

pub type SharedLogBuffer = Arc<Mutex<LogRingBuffer>>;

pub fn shared_buffer() -> SharedLogBuffer {
    Arc::new(Mutex::new(LogRingBuffer::new(LOG_RING_CAPACITY)))
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Append an entry and return its id.
    pub fn push(
        &mut self,
        level: LogLevel,
        source: impl Into<String>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level,
            source: source.into(),
            message: message.into(),
            data,
        });
        id
    }

    /// The `limit` most recent entries at or above `min_level`, oldest first.
    /// A `limit` of 0 means all of them.
    pub fn entries(&self, limit: usize, min_level: Option<LogLevel>) -> Vec<LogEntry> {
        let matching: Vec<&LogEntry> = self
            .entries
            .iter()
            .filter(|e| min_level.is_none_or(|min| e.level >= min))
            .collect();
        let skip = if limit == 0 { 0 } else { matching.len().saturating_sub(limit) };
        matching.into_iter().skip(skip).cloned().collect()
    }

    /// Drop all entries. Ids keep increasing.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// tracing layer
// ---------------------------------------------------------------------------

/// Copies tracing events at or above `min_level` into the ring buffer.
pub struct RingBufferLayer {
    buffer: SharedLogBuffer,
    min_level: Level,
}

impl RingBufferLayer {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self {
            buffer,
            min_level: Level::WARN,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for RingBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // More verbose levels compare greater.
        if *meta.level() > self.min_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            message = format!("{message} {}", visitor.fields.join(" "));
        }
        let data = serde_json::json!({ "target": meta.target() });

        self.buffer
            .lock()
            .push(LogLevel::from(*meta.level()), "server", message, Some(data));
    }
}
