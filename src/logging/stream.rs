use std::{
    fmt::{self, Display, Write},
    panic::{self, AssertUnwindSafe},
};

use super::{logger::Shared, LogLevel, LogMessage};

const FORMAT_ERROR_PLACEHOLDER: &str = "<formatting error>";

/// Accumulates the text of one log statement and enqueues it on drop.
///
/// A stream whose level was filtered out when it was created is inert: appends
/// are ignored and nothing is enqueued. An enabled stream always enqueues
/// exactly one message, even if nothing was appended.
///
/// ```ignore
/// logger
///     .log(LogLevel::Info, "net", "src/net.rs:42")
///     .append("connected to ")
///     .append(peer);
/// ```
pub struct LogStream<'a> {
    shared: Option<&'a Shared>,
    level: LogLevel,
    module: &'a str,
    position: &'a str,
    buffer: String,
}

impl<'a> LogStream<'a> {
    pub(crate) fn new(shared: &'a Shared, level: LogLevel, module: &'a str, position: &'a str) -> Self {
        Self {
            shared: shared.is_enabled(level).then_some(shared),
            level,
            module,
            position,
            buffer: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Appends `value`, falling back to a placeholder if its `Display`
    /// implementation fails or panics.
    pub fn push(&mut self, value: impl Display) -> &mut Self {
        if self.shared.is_none() {
            return self;
        }

        let start = self.buffer.len();
        let buffer = &mut self.buffer;
        let written = panic::catch_unwind(AssertUnwindSafe(|| write!(buffer, "{}", value).is_ok()))
            .unwrap_or(false);

        if !written {
            self.buffer.truncate(start);
            self.buffer.push_str(FORMAT_ERROR_PLACEHOLDER);
        }

        self
    }

    pub fn append(mut self, value: impl Display) -> Self {
        self.push(value);
        self
    }
}

impl fmt::Write for LogStream<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.shared.is_some() {
            self.buffer.push_str(s);
        }
        Ok(())
    }
}

impl Drop for LogStream<'_> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let text = std::mem::take(&mut self.buffer);
            shared.enqueue(LogMessage::new(self.level, text, self.module, self.position));
        }
    }
}
