use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError,
    },
    thread::{self, JoinHandle, ThreadId},
};

use super::{
    error::LoggerError,
    formatters::{DefaultFormatter, FormatConfig, JsonFormatter},
    global,
    sinks::{ConsoleSink, FileSink},
    LogFormatter, LogLevel, LogMessage, LogSink, LogStream,
};

/// Lifecycle of a [`Logger`].
///
/// `Idle` until the first sink is added, `Running` while the worker accepts
/// messages, `Draining` once `close` was requested and the worker is emptying
/// the queue, `Closed` after the worker has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Idle,
    Running,
    Draining,
    Closed,
}

struct Queue {
    messages: VecDeque<LogMessage>,
    state: LoggerState,
    enqueued: u64,
    delivered: u64,
}

/// State shared between the owning `Logger`, its handles and the worker.
pub(crate) struct Shared {
    level: AtomicU8,
    queue: Mutex<Queue>,
    available: Condvar,
    delivered: Condvar,
    sinks: Mutex<Vec<Box<dyn LogSink>>>,
    // Mirrors `sinks.len()` so it can be read while the worker holds `sinks`.
    sink_count: AtomicUsize,
    worker_thread: OnceLock<ThreadId>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Sink panics are caught before they can unwind through a guard, so a
    // poisoned lock still holds consistent data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(level: LogLevel) -> Self {
        Self {
            level: AtomicU8::new(level.as_u8()),
            queue: Mutex::new(Queue {
                messages: VecDeque::new(),
                state: LoggerState::Idle,
                enqueued: 0,
                delivered: 0,
            }),
            available: Condvar::new(),
            delivered: Condvar::new(),
            sinks: Mutex::new(Vec::new()),
            sink_count: AtomicUsize::new(0),
            worker_thread: OnceLock::new(),
        }
    }

    pub(crate) fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    fn set_level(&self, level: LogLevel) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub(crate) fn is_enabled(&self, level: LogLevel) -> bool {
        level.passes(self.level())
    }

    fn state(&self) -> LoggerState {
        lock(&self.queue).state
    }

    fn update_sinks<R>(&self, change: impl FnOnce(&mut Vec<Box<dyn LogSink>>) -> R) -> R {
        let mut sinks = lock(&self.sinks);
        let result = change(&mut sinks);
        self.sink_count.store(sinks.len(), Ordering::Relaxed);
        result
    }

    fn on_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    /// Queues `msg` for the worker. Returns `false` if it was filtered out or
    /// the logger is not accepting messages.
    pub(crate) fn enqueue(&self, msg: LogMessage) -> bool {
        if !self.is_enabled(msg.level()) {
            return false;
        }

        let mut queue = lock(&self.queue);
        if queue.state != LoggerState::Running {
            return false;
        }

        queue.messages.push_back(msg);
        queue.enqueued += 1;
        drop(queue);

        self.available.notify_one();
        true
    }

    fn next_message(&self) -> Option<LogMessage> {
        let mut queue = lock(&self.queue);
        loop {
            if let Some(msg) = queue.messages.pop_front() {
                return Some(msg);
            }
            if queue.state != LoggerState::Running {
                return None;
            }
            queue = self
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn dispatch(&self, msg: &LogMessage) {
        let mut sinks = lock(&self.sinks);
        for (index, sink) in sinks.iter_mut().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.write_log(msg))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let err = format!("{:#}", err);
                    tracing::warn!(sink = index, error = %err, "log sink failed");
                }
                Err(_) => tracing::error!(sink = index, "log sink panicked"),
            }
        }
    }

    fn mark_delivered(&self) {
        lock(&self.queue).delivered += 1;
        self.delivered.notify_all();
    }

    fn flush_sinks(&self) {
        let mut sinks = lock(&self.sinks);
        for (index, sink) in sinks.iter_mut().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    let err = format!("{:#}", err);
                    tracing::warn!(sink = index, error = %err, "log sink flush failed");
                }
                Err(_) => tracing::error!(sink = index, "log sink panicked while flushing"),
            }
        }
    }

    /// Body of the worker thread: drain the queue in FIFO order until asked
    /// to stop and nothing is left.
    fn run(&self) {
        let _ = self.worker_thread.set(thread::current().id());
        tracing::debug!("log worker started");

        while let Some(msg) = self.next_message() {
            self.dispatch(&msg);
            self.mark_delivered();
        }

        self.flush_sinks();
        tracing::debug!("log worker stopped");
    }

    fn begin_drain(&self) -> LoggerState {
        let mut queue = lock(&self.queue);
        if queue.state == LoggerState::Running {
            queue.state = LoggerState::Draining;
        }
        let state = queue.state;
        drop(queue);

        self.available.notify_all();
        state
    }
}

/// Asynchronous logger with a single background writer thread.
///
/// Producers only touch the queue mutex; every sink call happens on the
/// worker thread, one message at a time, in submission order. Dropping the
/// logger closes it, which drains everything already queued.
pub struct Logger {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Logger {
    /// Creates a logger without sinks. The worker starts with the first
    /// [`add_sink`](Self::add_sink).
    ///
    /// The first logger created while no other is registered becomes the
    /// global one (see [`global`](crate::global)).
    pub fn new(level: LogLevel) -> Self {
        let logger = Self {
            shared: Arc::new(Shared::new(level)),
            worker: Mutex::new(None),
        };

        global::register_if_vacant(&logger.shared);
        logger
    }

    pub fn with_sinks(level: LogLevel, sinks: Vec<Box<dyn LogSink>>) -> Result<Self, LoggerError> {
        let logger = Self::new(level);
        for sink in sinks {
            logger.add_boxed_sink(sink)?;
        }
        Ok(logger)
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Starts a log statement. The returned stream enqueues its message when
    /// dropped; it is inert if `level` does not pass the current threshold.
    pub fn log<'a>(&'a self, level: LogLevel, module: &'a str, position: &'a str) -> LogStream<'a> {
        LogStream::new(&self.shared, level, module, position)
    }

    /// Enqueues an already built message. Returns whether it was accepted.
    pub fn submit(&self, msg: LogMessage) -> bool {
        self.shared.enqueue(msg)
    }

    pub fn level(&self) -> LogLevel {
        self.shared.level()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.shared.set_level(level);
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.shared.is_enabled(level)
    }

    pub fn state(&self) -> LoggerState {
        self.shared.state()
    }

    /// Number of registered sinks. Safe to call from inside a sink.
    pub fn sink_count(&self) -> usize {
        self.shared.sink_count.load(Ordering::Relaxed)
    }

    pub fn handle(&self) -> LoggerHandle {
        LoggerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Registers this logger as the process-wide default.
    pub fn make_global(&self) {
        global::register(&self.shared);
    }

    pub fn is_global(&self) -> bool {
        global::is_registered(&self.shared)
    }

    pub fn add_sink<S: LogSink + 'static>(&self, sink: S) -> Result<(), LoggerError> {
        self.add_boxed_sink(Box::new(sink))
    }

    /// Appends a sink; the first one starts the worker thread.
    pub fn add_boxed_sink(&self, sink: Box<dyn LogSink>) -> Result<(), LoggerError> {
        if self.shared.on_worker_thread() {
            return Err(LoggerError::WorkerReentrancy);
        }

        let mut worker = lock(&self.worker);
        {
            let mut queue = lock(&self.shared.queue);
            match queue.state {
                LoggerState::Draining | LoggerState::Closed => return Err(LoggerError::Closed),
                LoggerState::Idle => queue.state = LoggerState::Running,
                LoggerState::Running => {}
            }
        }

        self.shared.update_sinks(|sinks| sinks.push(sink));

        if worker.is_none() {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name("mplog-worker".into())
                .spawn(move || shared.run());

            match spawned {
                Ok(handle) => *worker = Some(handle),
                Err(err) => {
                    self.shared.update_sinks(|sinks| sinks.pop());
                    lock(&self.shared.queue).state = LoggerState::Idle;
                    return Err(LoggerError::WorkerSpawn(err));
                }
            }
        }

        Ok(())
    }

    /// Removes and returns the sink at `index`.
    ///
    /// Waits until every message enqueued before this call has been delivered,
    /// so the removed sink sees all of them and nothing logged afterwards.
    pub fn remove_sink(&self, index: usize) -> Result<Box<dyn LogSink>, LoggerError> {
        if self.shared.on_worker_thread() {
            return Err(LoggerError::WorkerReentrancy);
        }

        let mut queue = lock(&self.shared.queue);
        if queue.state == LoggerState::Closed {
            return Err(LoggerError::Closed);
        }

        let target = queue.enqueued;
        while queue.delivered < target
            && matches!(queue.state, LoggerState::Running | LoggerState::Draining)
        {
            queue = self
                .shared
                .delivered
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(queue);

        self.shared.update_sinks(|sinks| {
            if index >= sinks.len() {
                return Err(LoggerError::SinkIndexOutOfRange {
                    index,
                    len: sinks.len(),
                });
            }
            Ok(sinks.remove(index))
        })
    }

    /// Stops accepting messages, lets the worker deliver everything already
    /// queued, joins it and drops the sinks. Calling it again is a no-op.
    ///
    /// Called from inside a sink it only requests the drain; the join happens
    /// on the next `close` from another thread or on drop.
    pub fn close(&self) {
        if self.shared.on_worker_thread() {
            self.shared.begin_drain();
            return;
        }

        // Held until the end so a concurrent close waits for the join.
        let mut worker = lock(&self.worker);
        if self.shared.begin_drain() == LoggerState::Closed {
            return;
        }

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!("log worker thread panicked");
            }
        }

        lock(&self.shared.queue).state = LoggerState::Closed;
        self.shared.delivered.notify_all();

        let sinks = self.shared.update_sinks(std::mem::take);
        drop(sinks);

        global::unregister(&self.shared);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cloneable handle for logging from anywhere without owning the worker.
///
/// Messages sent through a handle after its logger closed are dropped.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) shared: Arc<Shared>,
}

impl LoggerHandle {
    pub fn log<'a>(&'a self, level: LogLevel, module: &'a str, position: &'a str) -> LogStream<'a> {
        LogStream::new(&self.shared, level, module, position)
    }

    pub fn submit(&self, msg: LogMessage) -> bool {
        self.shared.enqueue(msg)
    }

    pub fn level(&self) -> LogLevel {
        self.shared.level()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.shared.set_level(level);
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.shared.is_enabled(level)
    }

    /// Whether this handle refers to `logger`.
    pub fn same_logger(&self, logger: &Logger) -> bool {
        Arc::ptr_eq(&self.shared, &logger.shared)
    }
}

type FormatterFactory = Box<dyn Fn(FormatConfig) -> Box<dyn LogFormatter>>;
type SinkConstructor = Box<dyn FnOnce(&FormatterFactory, &FormatConfig) -> eyre::Result<Box<dyn LogSink>>>;

pub struct Builder {
    level: LogLevel,
    constructors: Vec<SinkConstructor>,
    formatter_builder: FormatterFactory,
    config: FormatConfig,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            level: LogLevel::Info,
            constructors: Vec::new(),
            formatter_builder: Box::new(|config| Box::new(DefaultFormatter::new(config))),
            config: FormatConfig::new(),
        }
    }

    pub fn with_level(self, level: LogLevel) -> Self {
        Self { level, ..self }
    }

    pub fn with_config(self, config: FormatConfig) -> Self {
        Self { config, ..self }
    }

    /// Render every sink's output as JSON lines instead of the text layout.
    pub fn with_json_output(self) -> Self {
        Self {
            formatter_builder: Box::new(|_| Box::new(JsonFormatter)),
            ..self
        }
    }

    pub fn with_console_sink(mut self) -> Self {
        self.constructors.push(Box::new(|formatter: &FormatterFactory, config: &FormatConfig| {
            let sink = ConsoleSink::new(formatter(config.clone()));
            Ok(Box::new(sink))
        }));
        self
    }

    pub fn with_file_sink(self, path: impl Into<PathBuf>) -> Self {
        self.with_rotating_file_sink(path, 0, 0)
    }

    pub fn with_rotating_file_sink(mut self, path: impl Into<PathBuf>, max_size: u64, retain: usize) -> Self {
        let path: PathBuf = path.into();
        self.constructors.push(Box::new(move |formatter: &FormatterFactory, config: &FormatConfig| {
            let sink = FileSink::with_rotation(path, formatter(config.plain()), max_size, retain)?;
            Ok(Box::new(sink))
        }));
        self
    }

    #[cfg(unix)]
    pub fn with_syslog_sink(mut self, ident: impl Into<String>, facility: super::syslog::Facility) -> Self {
        let ident: String = ident.into();
        self.constructors.push(Box::new(move |formatter: &FormatterFactory, config: &FormatConfig| {
            let sink = super::syslog::SyslogSink::new(ident, facility, formatter(config.plain()));
            Ok(Box::new(sink))
        }));
        self
    }

    pub fn with_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.constructors.push(Box::new(move |_: &FormatterFactory, _: &FormatConfig| {
            Ok(Box::new(sink) as Box<dyn LogSink>)
        }));
        self
    }

    pub fn build(self) -> eyre::Result<Logger> {
        let mut sinks = Vec::with_capacity(self.constructors.len());
        for constructor in self.constructors {
            sinks.push(constructor(&self.formatter_builder, &self.config)?);
        }

        Ok(Logger::with_sinks(self.level, sinks)?)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
