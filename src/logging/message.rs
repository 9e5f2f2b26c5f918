use std::thread::{self, ThreadId};

use chrono::{DateTime, Local};

use super::LogLevel;

/// One finished log record.
///
/// Created when a [`LogStream`](super::LogStream) is dropped (or directly via
/// [`Logger::submit`](super::Logger::submit)), handed to every sink exactly
/// once and then discarded. There are no setters: a message is immutable
/// once built.
#[derive(Debug, Clone)]
pub struct LogMessage {
    level: LogLevel,
    text: String,
    module: Option<String>,
    position: Option<String>,
    timestamp: DateTime<Local>,
    thread: ThreadId,
}

impl LogMessage {
    /// Builds a message stamped with the current time and calling thread.
    ///
    /// Empty `module` or `position` strings are stored as absent.
    pub fn new(level: LogLevel, text: impl Into<String>, module: &str, position: &str) -> Self {
        Self {
            level,
            text: text.into(),
            module: non_empty(module),
            position: non_empty(position),
            timestamp: Local::now(),
            thread: thread::current().id(),
        }
    }

    #[must_use]
    pub fn with_timestamp(self, timestamp: DateTime<Local>) -> Self {
        Self { timestamp, ..self }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
