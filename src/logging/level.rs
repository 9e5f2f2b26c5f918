use std::{fmt, str::FromStr};

/// Severity of a log message, ordered from "log nothing" to "log everything".
///
/// A logger configured with threshold `t` accepts a message at level `m` when
/// `m != NoLog && m <= t`, so `NoLog` as a threshold silences the logger and
/// `All` lets every message through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    NoLog = 0,
    FatalError = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
    Debug2 = 6,
    All = 7,
}

impl LogLevel {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`LogLevel::as_u8`]; values above `All` saturate to `All`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::NoLog,
            1 => LogLevel::FatalError,
            2 => LogLevel::Error,
            3 => LogLevel::Warning,
            4 => LogLevel::Info,
            5 => LogLevel::Debug,
            6 => LogLevel::Debug2,
            _ => LogLevel::All,
        }
    }

    /// Whether a message at `self` passes the given threshold.
    pub fn passes(self, threshold: LogLevel) -> bool {
        self != LogLevel::NoLog && self <= threshold
    }

    /// Errors go to stderr on the console sink.
    pub fn is_error(self) -> bool {
        matches!(self, LogLevel::FatalError | LogLevel::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::NoLog => "NOLOG",
            LogLevel::FatalError => "FATAL_ERROR",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Debug2 => "DEBUG2",
            LogLevel::All => "ALL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "nolog" | "off" | "none" => LogLevel::NoLog,
            "fatal_error" | "fatal" => LogLevel::FatalError,
            "error" => LogLevel::Error,
            "warning" | "warn" => LogLevel::Warning,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "debug2" | "trace" => LogLevel::Debug2,
            "all" => LogLevel::All,
            _ => return Err(ParseLevelError(s.to_string())),
        };

        Ok(level)
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Debug2,
        }
    }
}

impl LogLevel {
    /// The `log` facade filter admitting the same records as this threshold.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::NoLog => log::LevelFilter::Off,
            LogLevel::FatalError | LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Debug2 | LogLevel::All => log::LevelFilter::Trace,
        }
    }
}
