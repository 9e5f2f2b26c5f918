//! Asynchronous in-process logging.
//!
//! A [`Logger`] owns one background thread that drains a FIFO queue of
//! [`LogMessage`]s into its sinks (console, rotating file, syslog or any
//! closure). Call sites build messages through a [`LogStream`], usually via
//! the `log_info!` family of macros, and never wait on sink I/O.
//!
//! ```no_run
//! use mplog::{log_info, LogLevel, Logger};
//!
//! let logger = Logger::builder()
//!     .with_level(LogLevel::Debug)
//!     .with_console_sink()
//!     .with_rotating_file_sink("app.log", 1 << 20, 3)
//!     .build()?;
//!
//! log_info!(logger, "listening on port {}", 8080);
//! logger.close();
//! # Ok::<(), eyre::Report>(())
//! ```

pub mod logging;

pub use logging::*;
