use std::{
    fs::{self, File, OpenOptions},
    io::{self, LineWriter, Write},
    path::{Path, PathBuf},
};

use eyre::Context;

use super::{LogFormatter, LogMessage, LogSink};

/// Writes errors to stderr and everything else to stdout.
pub struct ConsoleSink {
    formatter: Box<dyn LogFormatter>,
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn new(formatter: Box<dyn LogFormatter>) -> Self {
        Self::with_writers(formatter, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Routes through `out` and `err` instead of the process streams.
    pub fn with_writers(
        formatter: Box<dyn LogFormatter>,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
    ) -> Self {
        Self { formatter, out, err }
    }
}

impl LogSink for ConsoleSink {
    fn write_log(&mut self, msg: &LogMessage) -> eyre::Result<()> {
        let line = self.formatter.format(msg);

        if msg.level().is_error() {
            writeln!(self.err, "{}", line).context("Can't write to stderr")
        } else {
            writeln!(self.out, "{}", line).context("Can't write to stdout")
        }
    }

    fn flush(&mut self) -> eyre::Result<()> {
        self.out.flush().context("Can't flush stdout")?;
        self.err.flush().context("Can't flush stderr")?;
        Ok(())
    }
}

/// Appends to a file, rotating it into numbered backups once it grows past
/// `max_size` bytes.
///
/// Backups are named `<file>.1` (newest) to `<file>.<retain>` (oldest). A
/// `max_size` of zero disables rotation.
pub struct FileSink {
    file: Option<LineWriter<File>>,
    file_path: PathBuf,
    formatter: Box<dyn LogFormatter>,
    max_size: u64,
    retain: usize,
    current_size: u64,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, formatter: Box<dyn LogFormatter>) -> eyre::Result<Self> {
        Self::with_rotation(path, formatter, 0, 0)
    }

    pub fn with_rotation(
        path: impl Into<PathBuf>,
        formatter: Box<dyn LogFormatter>,
        max_size: u64,
        retain: usize,
    ) -> eyre::Result<Self> {
        let file_path: PathBuf = path.into();
        let file = open_append(&file_path)?;
        let current_size = file
            .metadata()
            .with_context(|| format!("Failed reading metadata of {}", file_path.display()))?
            .len();

        Ok(Self {
            file: Some(LineWriter::new(file)),
            file_path,
            formatter,
            max_size,
            retain,
            current_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.file_path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn needs_rotation(&self, incoming: u64) -> bool {
        self.max_size > 0
            && self.current_size > 0
            && self.current_size.saturating_add(incoming) > self.max_size
    }

    fn rotate(&mut self) -> eyre::Result<()> {
        // Close the active handle before renaming it away.
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        if self.retain > 0 {
            let oldest = self.backup_path(self.retain);
            if oldest.exists() {
                fs::remove_file(&oldest)
                    .with_context(|| format!("Failed removing {}", oldest.display()))?;
            }

            for index in (1..self.retain).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    let to = self.backup_path(index + 1);
                    fs::rename(&from, &to)
                        .with_context(|| format!("Failed renaming {}", from.display()))?;
                }
            }

            if self.file_path.exists() {
                let first = self.backup_path(1);
                fs::rename(&self.file_path, &first)
                    .with_context(|| format!("Failed renaming {}", self.file_path.display()))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.file_path)
            .with_context(|| format!("Failed reopening log file {}", self.file_path.display()))?;

        self.file = Some(LineWriter::new(file));
        self.current_size = 0;

        tracing::debug!(path = %self.file_path.display(), retain = self.retain, "rotated log file");
        Ok(())
    }

    fn reopen(&mut self) -> eyre::Result<()> {
        let file = open_append(&self.file_path)?;
        self.current_size = file.metadata().map(|md| md.len()).unwrap_or(0);
        self.file = Some(LineWriter::new(file));
        Ok(())
    }
}

fn open_append(path: &Path) -> eyre::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed opening or creating log file {}", path.display()))
}

impl LogSink for FileSink {
    fn write_log(&mut self, msg: &LogMessage) -> eyre::Result<()> {
        let mut line = self.formatter.format(msg);
        line.push('\n');
        let len = line.len() as u64;

        if self.file.is_none() {
            self.reopen()?;
        }

        if self.needs_rotation(len) {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| eyre::eyre!("Log file {} is not open", self.file_path.display()))?;

        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed writing to {}", self.file_path.display()))?;
        self.current_size += len;

        Ok(())
    }

    fn flush(&mut self) -> eyre::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().context("Can't flush file")?;
        }
        Ok(())
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: FnMut(&LogMessage) -> eyre::Result<()> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> LogSink for FnSink<F>
where
    F: FnMut(&LogMessage) -> eyre::Result<()> + Send,
{
    fn write_log(&mut self, msg: &LogMessage) -> eyre::Result<()> {
        (self.callback)(msg)
    }
}

#[derive(Debug, Default)]
pub struct NullSink {}

impl NullSink {
    pub fn new() -> Self {
        Self {}
    }
}

impl LogSink for NullSink {
    fn write_log(&mut self, _msg: &LogMessage) -> eyre::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::logging::{DefaultFormatter, FormatConfig, LogLevel};

    fn plain() -> Box<dyn LogFormatter> {
        Box::new(DefaultFormatter::new(FormatConfig::new().plain()))
    }

    fn msg(text: &str) -> LogMessage {
        LogMessage::new(LogLevel::Info, text, "test", "")
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_sink_sends_errors_to_the_error_stream() {
        let (out, err) = (SharedBuf::default(), SharedBuf::default());
        let mut sink = ConsoleSink::with_writers(plain(), Box::new(out.clone()), Box::new(err.clone()));

        for (level, text) in [
            (LogLevel::FatalError, "fatal"),
            (LogLevel::Error, "error"),
            (LogLevel::Warning, "warning"),
            (LogLevel::Info, "info"),
            (LogLevel::Debug2, "debug2"),
        ] {
            sink.write_log(&LogMessage::new(level, text, "console", "")).unwrap();
        }
        sink.flush().unwrap();

        let err = err.lines();
        assert_eq!(err.len(), 2);
        assert!(err[0].starts_with("[FATAL_ERROR]") && err[0].contains(": fatal"));
        assert!(err[1].starts_with("[ERROR]") && err[1].contains(": error"));

        let out = out.lines();
        assert_eq!(out.len(), 3);
        assert!(out[0].contains(": warning"));
        assert!(out[1].contains(": info"));
        assert!(out[2].contains(": debug2"));
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        let mut sink = FileSink::new(&path, plain()).unwrap();
        sink.write_log(&msg("first")).unwrap();
        sink.write_log(&msg("second")).unwrap();
        sink.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("(test): first"));
        assert!(lines[1].contains("(test): second"));
        assert_eq!(sink.current_size(), contents.len() as u64);
    }

    #[test]
    fn file_sink_picks_up_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "0123456789").unwrap();

        let sink = FileSink::with_rotation(&path, plain(), 100, 1).unwrap();
        assert_eq!(sink.current_size(), 10);
    }

    #[test]
    fn rotation_keeps_at_most_retain_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        let mut sink = FileSink::with_rotation(&path, plain(), 100, 2).unwrap();
        for i in 0..12 {
            sink.write_log(&msg(&format!("message number {:02}", i))).unwrap();
        }
        sink.flush().unwrap();

        assert!(path.exists());
        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
        assert!(fs::metadata(&path).unwrap().len() <= 100);
    }

    #[test]
    fn backup_count_matches_number_of_rotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.log");

        // Every line is well over half the threshold, so each write after the
        // first into a file triggers exactly one rotation.
        let mut sink = FileSink::with_rotation(&path, plain(), 120, 3).unwrap();
        let text = "x".repeat(40);

        sink.write_log(&msg(&text)).unwrap();
        sink.write_log(&msg(&text)).unwrap(); // T = 1
        assert!(dir.path().join("r.log.1").exists());
        assert!(!dir.path().join("r.log.2").exists());

        sink.write_log(&msg("newest")).unwrap(); // T = 2
        sink.flush().unwrap();
        assert!(dir.path().join("r.log.2").exists());
        assert!(!dir.path().join("r.log.3").exists());

        let newest_backup = fs::read_to_string(dir.path().join("r.log.1")).unwrap();
        assert!(newest_backup.contains(&text));
        assert!(fs::read_to_string(&path).unwrap().contains("newest"));
    }

    #[test]
    fn retain_zero_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.log");

        let mut sink = FileSink::with_rotation(&path, plain(), 80, 0).unwrap();
        sink.write_log(&msg(&"a".repeat(40))).unwrap();
        sink.write_log(&msg("b")).unwrap();
        sink.flush().unwrap();

        assert!(!dir.path().join("t.log.1").exists());
        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("aaaa"));
        assert!(contents.contains(": b"));
    }

    #[test]
    fn oversized_line_into_empty_file_does_not_rotate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");

        let mut sink = FileSink::with_rotation(&path, plain(), 10, 2).unwrap();
        sink.write_log(&msg("far longer than ten bytes")).unwrap();

        assert!(!dir.path().join("big.log.1").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_reopen_is_retried_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        let path = logs.join("app.log");

        let mut sink = FileSink::with_rotation(&path, plain(), 60, 1).unwrap();
        sink.write_log(&msg("first entry")).unwrap();

        // Make the directory vanish so the rotation cannot reopen the file.
        fs::remove_dir_all(&logs).unwrap();
        assert!(sink.write_log(&msg("second entry")).is_err());

        fs::create_dir(&logs).unwrap();
        sink.write_log(&msg("third entry")).unwrap();
        sink.flush().unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("third entry"));
    }

    #[test]
    fn fn_sink_forwards_to_closure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let mut sink = FnSink::new(move |m: &LogMessage| {
            captured.lock().unwrap().push(m.text().to_string());
            Ok(())
        });

        sink.write_log(&msg("a")).unwrap();
        sink.write_log(&msg("b")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
