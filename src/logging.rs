//! In-memory message log.
//!
//! [`LogQueue`] is a `tracing` layer that keeps the most recent events so
//! they can be paged in log mode. Each rendered line looks like
//! `[12:34:56]<E> message`, the level letter always at byte 11.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Default number of events kept.
pub const DEFAULT_CAPACITY: usize = 500;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    /// The entry as one line of the log view.
    pub fn render(&self) -> String {
        format!(
            "[{}]<{}> {}\n",
            self.time.format("%H:%M:%S"),
            level_code(&self.level),
            self.message
        )
    }
}

/// One-letter code of a level: `E`rror, `W`arning, `M`essage, debug `1`, trace `2`.
pub fn level_code(level: &Level) -> char {
    match *level {
        Level::ERROR => 'E',
        Level::WARN => 'W',
        Level::INFO => 'M',
        Level::DEBUG => '1',
        Level::TRACE => '2',
    }
}

/// Bounded queue of recent events, shared between the layer and readers.
#[derive(Debug, Clone)]
pub struct LogQueue {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry, dropping the oldest when full.
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All entries as log-view text, oldest first.
    pub fn render(&self) -> String {
        self.lock().iter().map(LogEntry::render).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Collects an event's message followed by its other fields.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for LogQueue {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut message = visitor.message;
        message.push_str(&visitor.fields);
        // keep each entry on one line of the log view
        let message = message.replace('\n', " ");
        self.push(LogEntry {
            time: Local::now(),
            level: *event.metadata().level(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn entry(level: Level, message: &str) -> LogEntry {
        LogEntry {
            time: Local::now(),
            level,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_render_format() {
        let line = entry(Level::ERROR, "disk full").render();
        assert_eq!(line.len(), "[00:00:00]<E> disk full\n".len());
        assert_eq!(line.as_bytes()[11], b'E');
        assert!(line.ends_with("<E> disk full\n"));
    }

    #[test]
    fn test_level_codes() {
        assert_eq!(level_code(&Level::WARN), 'W');
        assert_eq!(level_code(&Level::INFO), 'M');
        assert_eq!(level_code(&Level::DEBUG), '1');
        assert_eq!(level_code(&Level::TRACE), '2');
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = LogQueue::new(2);
        queue.push(entry(Level::INFO, "one"));
        queue.push(entry(Level::INFO, "two"));
        queue.push(entry(Level::INFO, "three"));
        let text = queue.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(queue.len(), 2);
        assert!(lines[0].ends_with("<M> two"));
        assert!(lines[1].ends_with("<M> three"));
    }

    #[test]
    fn test_layer_records_events() {
        let queue = LogQueue::new(10);
        let subscriber = tracing_subscriber::registry().with(queue.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("boom");
            tracing::info!(rows = 3, "loaded");
        });
        let text = queue.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("<E> boom"));
        assert!(lines[1].ends_with("<M> loaded rows=3"));
    }

    #[test]
    fn test_clear() {
        let queue = LogQueue::default();
        queue.push(entry(Level::WARN, "x"));
        assert!(!queue.is_empty());
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
