use std::{
    thread,
    time::{Duration, Instant},
};

use clap::Args;
use eyre::eyre;
use mplog::{log_debug, log_info, Logger};

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(short, long, default_value_t = 4, help = "Number of producer threads.")]
    pub threads: usize,

    #[arg(short, long, default_value_t = 1000, help = "Messages logged by each thread.")]
    pub messages: usize,

    #[arg(
        short,
        long,
        value_parser = humantime::parse_duration,
        help = "Pause between two messages of the same thread, e.g. 5ms."
    )]
    pub pause: Option<Duration>,
}

impl Cmd {
    pub fn run(&self, logger: &Logger) -> eyre::Result<()> {
        let started = Instant::now();

        let producers: Vec<_> = (0..self.threads)
            .map(|id| {
                let handle = logger.handle();
                let messages = self.messages;
                let pause = self.pause;
                thread::Builder::new()
                    .name(format!("producer-{}", id))
                    .spawn(move || {
                        for seq in 0..messages {
                            log_info!(handle, "producer {} message {}", id, seq);
                            if let Some(pause) = pause {
                                thread::sleep(pause);
                            }
                        }
                        log_debug!(handle, "producer {} done", id);
                    })
            })
            .collect::<Result<_, _>>()?;

        for producer in producers {
            producer
                .join()
                .map_err(|_| eyre!("A producer thread panicked"))?;
        }

        let elapsed = started.elapsed();
        log::info!(
            target: "mplog",
            "stress run queued {} messages in {}",
            self.threads * self.messages,
            humantime::format_duration(elapsed)
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use mplog::{FnSink, LogLevel, LogMessage};

    use super::*;

    fn counting_logger(level: LogLevel) -> (Logger, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let logger = Logger::new(level);
        logger
            .add_sink(FnSink::new(move |m: &LogMessage| {
                captured.lock().unwrap().push(m.text().to_string());
                Ok(())
            }))
            .unwrap();
        (logger, seen)
    }

    #[test]
    fn every_produced_message_reaches_the_sinks() {
        let (logger, seen) = counting_logger(LogLevel::Info);
        let cmd = Cmd {
            threads: 3,
            messages: 40,
            pause: None,
        };

        cmd.run(&logger).unwrap();
        logger.close();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3 * 40);
        assert!(seen.iter().all(|text| text.starts_with("producer ")));
        assert!(seen.iter().any(|text| text == "producer 2 message 39"));
    }

    #[test]
    fn debug_threshold_adds_completion_messages() {
        let (logger, seen) = counting_logger(LogLevel::Debug);
        let cmd = Cmd {
            threads: 2,
            messages: 5,
            pause: Some(Duration::from_millis(1)),
        };

        cmd.run(&logger).unwrap();
        logger.close();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2 * 5 + 2);
        assert!(seen.iter().any(|text| text == "producer 0 done"));
    }
}
