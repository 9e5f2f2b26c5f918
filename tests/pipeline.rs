use std::{
    fs,
    sync::{Arc, Mutex},
    thread,
};

use mplog::{log_info, DefaultFormatter, FileSink, FnSink, FormatConfig, LogLevel, LogMessage, Logger};

#[test]
fn info_threshold_scenario() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let captured = Arc::clone(&seen);

    let logger = Logger::new(LogLevel::Info);
    logger
        .add_sink(FnSink::new(move |m: &LogMessage| {
            captured.lock().unwrap().push(m.text().to_string());
            Ok(())
        }))
        .unwrap();

    logger.log(LogLevel::Debug, "scenario", "").append("debug noise");
    logger.log(LogLevel::Info, "scenario", "").append("hello");
    logger.close();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("hello"));
}

#[test]
fn rotation_scenario_with_small_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.log");

    let sink = FileSink::with_rotation(
        &path,
        Box::new(DefaultFormatter::new(FormatConfig::new().plain())),
        100,
        2,
    )
    .unwrap();
    let logger = Logger::new(LogLevel::All);
    logger.add_sink(sink).unwrap();

    let mut written = 0;
    let mut i = 0;
    while written <= 300 {
        let text = format!("rotation payload {}", i);
        written += text.len();
        logger.log(LogLevel::Info, "rot", "").append(text);
        i += 1;
    }
    logger.close();

    assert!(path.exists());
    assert!(dir.path().join("scenario.log.1").exists());
    assert!(dir.path().join("scenario.log.2").exists());
    assert!(!dir.path().join("scenario.log.3").exists());
}

#[test]
fn no_message_is_lost_across_threads_and_sinks() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 400;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("all.log");
    let counted = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&counted);

    let logger = Arc::new(
        Logger::builder()
            .with_level(LogLevel::All)
            .with_file_sink(&path)
            .with_sink(FnSink::new(move |_: &LogMessage| {
                *counter.lock().unwrap() += 1;
                Ok(())
            }))
            .build()
            .unwrap(),
    );

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    log_info!(logger, "t{} #{}", t, i);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    logger.close();

    assert_eq!(*counted.lock().unwrap(), THREADS * PER_THREAD);
    let lines = fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, THREADS * PER_THREAD);
}
