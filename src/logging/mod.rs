mod error;
mod formatters;
mod global;
mod level;
mod logger;
mod macros;
mod message;
mod sinks;
mod stream;
#[cfg(unix)]
mod syslog;

pub use error::LoggerError;
pub use formatters::{DefaultFormatter, FormatConfig, JsonFormatter};
pub use global::{clear_global, global, install_log_bridge};
pub use level::{LogLevel, ParseLevelError};
pub use logger::{Builder, Logger, LoggerHandle, LoggerState};
pub use message::LogMessage;
pub use sinks::{ConsoleSink, FileSink, FnSink, NullSink};
pub use stream::LogStream;
#[cfg(unix)]
pub use syslog::{Facility, SyslogSink};

pub trait LogFormatter: Sync + Send {
    fn format(&self, msg: &LogMessage) -> String;
}

/// Destination for finished messages.
///
/// A logger calls its sinks only from its worker thread, one after the other,
/// so implementations get `&mut self` and need no locking of their own.
/// Errors are reported by the logger and never reach the code that logged.
pub trait LogSink: Send {
    fn write_log(&mut self, msg: &LogMessage) -> eyre::Result<()>;

    fn flush(&mut self) -> eyre::Result<()> {
        Ok(())
    }
}
