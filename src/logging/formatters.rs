use serde_json::json;
use yansi::Paint;

use super::{LogFormatter, LogLevel, LogMessage};

#[derive(Debug, Clone)]
pub struct FormatConfig {
    pub datetime_format: String,
    pub use_ansi: bool,
}

impl FormatConfig {
    pub fn new() -> Self {
        Self {
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            use_ansi: true,
        }
    }

    /// Same config with colouring turned off, for files and syslog.
    pub fn plain(&self) -> Self {
        Self {
            use_ansi: false,
            ..self.clone()
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `[LEVEL] [timestamp] (module): message\tThread: <id>\t@File: <position>`.
pub struct DefaultFormatter {
    config: FormatConfig,
}

impl DefaultFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    fn timestamp(&self, msg: &LogMessage) -> String {
        let time = msg.timestamp().format(&self.config.datetime_format);
        if self.config.use_ansi {
            format!("[{}]", time).bright_black().to_string()
        } else {
            format!("[{}]", time)
        }
    }

    fn format_level(&self, level: LogLevel) -> String {
        let tag = format!("[{}]", level);
        if !self.config.use_ansi {
            return tag;
        }

        match level {
            LogLevel::FatalError => tag.red().bold().to_string(),
            LogLevel::Error => tag.red().to_string(),
            LogLevel::Warning => tag.yellow().to_string(),
            LogLevel::Info => tag.green().to_string(),
            LogLevel::Debug => tag.blue().to_string(),
            LogLevel::Debug2 | LogLevel::NoLog | LogLevel::All => tag.white().to_string(),
        }
    }
}

impl LogFormatter for DefaultFormatter {
    fn format(&self, msg: &LogMessage) -> String {
        let mut line = format!("{} {}", self.format_level(msg.level()), self.timestamp(msg));

        if let Some(module) = msg.module() {
            line.push_str(&format!(" ({})", module));
        }

        line.push_str(&format!(": {}\tThread: {:?}", msg.text(), msg.thread()));

        if let Some(position) = msg.position() {
            line.push_str(&format!("\t@File: {}", position));
        }

        line
    }
}

/// One JSON object per message, for log shippers.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl LogFormatter for JsonFormatter {
    fn format(&self, msg: &LogMessage) -> String {
        json!({
            "level": msg.level().as_str(),
            "timestamp": msg.timestamp().to_rfc3339(),
            "module": msg.module(),
            "message": msg.text(),
            "thread": format!("{:?}", msg.thread()),
            "position": msg.position(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;

    fn fixed(msg: LogMessage) -> LogMessage {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 6).unwrap();
        msg.with_timestamp(ts)
    }

    #[test]
    fn default_format_has_all_fields_in_order() {
        let msg = fixed(LogMessage::new(LogLevel::Warning, "disk low", "storage", "src/a.rs:12"));
        let line = DefaultFormatter::new(FormatConfig::new().plain()).format(&msg);

        assert_eq!(
            line,
            format!(
                "[WARNING] [2024-03-09 14:05:06] (storage): disk low\tThread: {:?}\t@File: src/a.rs:12",
                msg.thread()
            )
        );
    }

    #[test]
    fn default_format_omits_missing_module_and_position() {
        let msg = fixed(LogMessage::new(LogLevel::Info, "hi", "", ""));
        let line = DefaultFormatter::new(FormatConfig::new().plain()).format(&msg);

        assert_eq!(
            line,
            format!("[INFO] [2024-03-09 14:05:06]: hi\tThread: {:?}", msg.thread())
        );
    }

    #[test]
    fn ansi_output_still_contains_text() {
        let msg = fixed(LogMessage::new(LogLevel::Error, "boom", "m", ""));
        let line = DefaultFormatter::new(FormatConfig::new()).format(&msg);

        assert!(line.contains("ERROR"));
        assert!(line.contains("boom"));
    }

    #[test]
    fn json_format_is_parseable() {
        let msg = fixed(LogMessage::new(LogLevel::Debug2, "x=1", "", "b.rs:3"));
        let line = JsonFormatter.format(&msg);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["level"], "DEBUG2");
        assert_eq!(value["message"], "x=1");
        assert_eq!(value["module"], serde_json::Value::Null);
        assert_eq!(value["position"], "b.rs:3");
    }
}
