use clap::Args;
use mplog::{LogLevel, Logger};

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(index = 1, help = "Level of the message.")]
    pub level: LogLevel,

    #[arg(index = 2, required = true, num_args = 1.., help = "Message text; words are joined with spaces.")]
    pub message: Vec<String>,

    #[arg(short, long, default_value = "mplog", help = "Module name recorded with the message.")]
    pub module: String,
}

impl Cmd {
    pub fn run(&self, logger: &Logger) -> eyre::Result<()> {
        if !logger.is_enabled(self.level) {
            tracing::info!(level = %self.level, threshold = %logger.level(), "message filtered out");
            return Ok(());
        }

        logger
            .log(self.level, &self.module, "")
            .append(self.message.join(" "));
        Ok(())
    }
}
