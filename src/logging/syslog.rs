//! Local syslog sink.
//!
//! Speaks the BSD syslog datagram format (`<PRI>ident[pid]: message`) over the
//! local unix socket, so no C bindings are needed.

use std::{
    os::unix::net::UnixDatagram,
    path::{Path, PathBuf},
};

use eyre::Context;

use super::{LogFormatter, LogLevel, LogMessage, LogSink};

const DEFAULT_SOCKETS: [&str; 2] = ["/dev/log", "/var/run/syslog"];

/// Syslog facility codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Facility {
    User = 1,
    Daemon = 3,
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

/// Syslog severity for a level, or `None` for levels that are not real
/// message severities.
pub fn severity(level: LogLevel) -> Option<u8> {
    match level {
        LogLevel::FatalError => Some(2),
        LogLevel::Error => Some(3),
        LogLevel::Warning => Some(4),
        LogLevel::Info => Some(6),
        LogLevel::Debug | LogLevel::Debug2 => Some(7),
        LogLevel::NoLog | LogLevel::All => None,
    }
}

pub struct SyslogSink {
    socket: Option<UnixDatagram>,
    socket_path: Option<PathBuf>,
    ident: String,
    facility: Facility,
    formatter: Box<dyn LogFormatter>,
}

impl SyslogSink {
    /// Connects to the system syslog socket.
    ///
    /// A missing daemon is not an error here; the sink keeps trying to
    /// connect on every write.
    pub fn new(ident: impl Into<String>, facility: Facility, formatter: Box<dyn LogFormatter>) -> Self {
        let mut sink = Self {
            socket: None,
            socket_path: None,
            ident: ident.into(),
            facility,
            formatter,
        };

        if let Err(err) = sink.connect() {
            tracing::warn!(error = %err, "syslog unavailable, will retry on next message");
        }
        sink
    }

    /// Sends to a specific socket instead of the system default.
    pub fn with_socket(
        path: impl Into<PathBuf>,
        ident: impl Into<String>,
        facility: Facility,
        formatter: Box<dyn LogFormatter>,
    ) -> eyre::Result<Self> {
        let mut sink = Self {
            socket: None,
            socket_path: Some(path.into()),
            ident: ident.into(),
            facility,
            formatter,
        };

        sink.connect()?;
        Ok(sink)
    }

    fn connect(&mut self) -> eyre::Result<()> {
        let socket = UnixDatagram::unbound().context("Failed creating syslog socket")?;

        match &self.socket_path {
            Some(path) => socket
                .connect(path)
                .with_context(|| format!("Failed connecting to {}", path.display()))?,
            None => {
                let connected = DEFAULT_SOCKETS
                    .iter()
                    .any(|path| socket.connect(Path::new(path)).is_ok());
                if !connected {
                    return Err(eyre::eyre!("No syslog socket found at {:?}", DEFAULT_SOCKETS));
                }
            }
        }

        self.socket = Some(socket);
        Ok(())
    }

    /// Builds the datagram for `msg`, or `None` if the level has no syslog severity.
    pub fn encode(&self, msg: &LogMessage) -> Option<String> {
        let severity = severity(msg.level())?;
        let priority = self.facility as u8 * 8 + severity;

        Some(format!(
            "<{}>{}[{}]: {}",
            priority,
            self.ident,
            std::process::id(),
            self.formatter.format(msg)
        ))
    }
}

impl LogSink for SyslogSink {
    fn write_log(&mut self, msg: &LogMessage) -> eyre::Result<()> {
        let Some(datagram) = self.encode(msg) else {
            return Ok(());
        };

        if self.socket.is_none() {
            self.connect()?;
        }

        let sent = match self.socket.as_ref() {
            Some(socket) => socket.send(datagram.as_bytes()),
            None => return Err(eyre::eyre!("Syslog socket not connected")),
        };

        if let Err(err) = sent {
            // Force a reconnect next time, the daemon may have restarted.
            self.socket = None;
            return Err(err).context("Failed sending to syslog");
        }

        Ok(())
    }
}
