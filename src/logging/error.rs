use std::io;

/// Misuse of a [`Logger`](super::Logger), reported to the caller.
///
/// Sink I/O failures never show up here: they stay on the worker thread.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("logger is closed")]
    Closed,

    #[error("sink index {index} is out of range for {len} registered sinks")]
    SinkIndexOutOfRange { index: usize, len: usize },

    #[error("logger cannot be reconfigured from inside one of its own sinks")]
    WorkerReentrancy,

    #[error("failed to spawn the log worker thread")]
    WorkerSpawn(#[source] io::Error),

    #[error("a `log` facade logger is already installed")]
    BridgeInstalled,
}
