use std::{
    fmt::Display,
    io::{self, IsTerminal},
    path::PathBuf,
};

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context;
use mplog::{Builder, FormatConfig, LogLevel, Logger};
use tracing::level_filters::LevelFilter;

mod emit;
mod stress;

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputType {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum MplogCmd {
    Emit(emit::Cmd),

    Stress(stress::Cmd),
}

impl Display for MplogCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MplogCmd::Emit(cmd) => write!(f, "emit {}", cmd.level),
            MplogCmd::Stress(cmd) => write!(f, "stress {}x{}", cmd.threads, cmd.messages),
        }
    }
}

#[derive(Parser)]
#[command(version, long_version = "")]
#[command(about = "Drive the mplog asynchronous logger from the command line.", long_about = None, disable_help_subcommand = true)]
pub struct Mplog {
    #[arg(
        global = true,
        long,
        default_value_t = LogLevel::Info,
        help = "Minimum level a message needs to reach the sinks (nolog, fatal, error, warning, info, debug, debug2, all).",
        display_order = 0
    )]
    pub level: LogLevel,

    #[arg(global = true, long, help = "Also append messages to this file.", display_order = 1)]
    pub file: Option<PathBuf>,

    #[arg(
        global = true,
        long,
        default_value_t = 0,
        help = "Rotate the log file once it would grow past this many bytes. 0 disables rotation.",
        display_order = 1
    )]
    pub max_size: u64,

    #[arg(
        global = true,
        long,
        default_value_t = 3,
        help = "Number of rotated backups to keep next to the log file.",
        display_order = 1
    )]
    pub retain: usize,

    #[arg(global = true, long, help = "Forward messages to the local syslog daemon.", display_order = 2)]
    pub syslog: bool,

    #[arg(global = true, long, help = "Do not write messages to stdout/stderr.", display_order = 2)]
    pub no_console: bool,

    #[arg(global = true, long, value_enum, default_value_t = OutputType::Text, display_order = 3)]
    pub output: OutputType,

    #[arg(global = true, long, help = "Disable ANSI colours on the console.", display_order = 3)]
    pub no_color: bool,

    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Write the logger's own diagnostics to stderr.",
        display_order = 999
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: MplogCmd,
}

impl Mplog {
    fn diagnostics_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            4_u8..=u8::MAX => LevelFilter::TRACE,
        }
    }

    fn setup_diagnostics(&self) {
        let filter = self.diagnostics_filter();
        if filter == LevelFilter::OFF {
            return;
        }

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(filter)
            .init();
    }

    /// Colour only when both console streams are terminals, so redirected
    /// output stays free of escape codes.
    fn use_colors(&self) -> bool {
        !self.no_color && io::stdout().is_terminal() && io::stderr().is_terminal()
    }

    fn logger_builder(&self) -> Builder {
        let config = FormatConfig {
            use_ansi: self.use_colors(),
            ..FormatConfig::new()
        };

        let mut builder = Logger::builder().with_level(self.level).with_config(config);

        if let OutputType::Json = self.output {
            builder = builder.with_json_output();
        }

        if !self.no_console {
            builder = builder.with_console_sink();
        }

        if let Some(path) = &self.file {
            builder = builder.with_rotating_file_sink(path, self.max_size, self.retain);
        }

        if self.syslog {
            builder = with_syslog(builder);
        }

        builder
    }

    pub fn run(self) -> eyre::Result<()> {
        self.setup_diagnostics();

        let logger = self
            .logger_builder()
            .build()
            .context("Failed setting up the logger")?;
        mplog::install_log_bridge(self.level)?;

        tracing::debug!(command = %self.cmd, "running command");

        let result = match &self.cmd {
            MplogCmd::Emit(cmd) => cmd.run(&logger),
            MplogCmd::Stress(cmd) => cmd.run(&logger),
        };

        if let Err(err) = &result {
            log::error!(target: "mplog", "failed running command {}, error={}", &self.cmd, err);
        }

        logger.close();
        result
    }
}

#[cfg(unix)]
fn with_syslog(builder: Builder) -> Builder {
    builder.with_syslog_sink("mplog", mplog::Facility::User)
}

#[cfg(not(unix))]
fn with_syslog(builder: Builder) -> Builder {
    tracing::warn!("syslog is not available on this platform");
    builder
}
