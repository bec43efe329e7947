//! Recording collaborators and logging setup shared by the integration tests.

#![allow(dead_code)]

pub mod chain;

use opcursor::sink::check_arity;
use opcursor::{ErrorLogger, EventSink, Instrumentation, LabelState, LatencySink, ProcessIdentity};
use std::panic::Location;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub labels: Vec<String>,
    pub value: f64,
}

impl Observation {
    pub fn operation(&self) -> &str {
        &self.labels[self.labels.len() - 2]
    }

    pub fn status(&self) -> &str {
        &self.labels[self.labels.len() - 1]
    }

    pub fn entry(&self) -> (&str, &str) {
        (&self.labels[0], &self.labels[1])
    }
}

/// Latency sink that keeps every observation and rejects bad arity
#[derive(Default)]
pub struct RecordingLatency {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingLatency {
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().unwrap().clone()
    }
}

impl LatencySink for RecordingLatency {
    fn observe(&self, labels: &[String], value: f64) -> opcursor::Result<()> {
        check_arity(labels)?;
        self.observations.lock().unwrap().push(Observation {
            labels: labels.to_vec(),
            value,
        });
        Ok(())
    }
}

/// Latency sink that refuses every observation
pub struct FailingLatency;

impl LatencySink for FailingLatency {
    fn observe(&self, _labels: &[String], _value: f64) -> opcursor::Result<()> {
        Err(opcursor::CursorError::Config("sink unavailable".into()))
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub text: String,
    pub origin_file: String,
    pub origin_line: u32,
}

#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ErrorLogger for RecordingLogger {
    fn error(&self, text: &str, origin: &Location<'_>) {
        self.entries.lock().unwrap().push(LogEntry {
            text: text.to_string(),
            origin_file: origin.file().to_string(),
            origin_line: origin.line(),
        });
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    counters: Mutex<Vec<(String, u64)>>,
}

impl RecordingEvents {
    pub fn counters(&self) -> Vec<(String, u64)> {
        self.counters.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn inc_counter(&self, name: &str, amount: u64) {
        self.counters
            .lock()
            .unwrap()
            .push((name.to_string(), amount));
    }
}

pub fn test_identity() -> ProcessIdentity {
    ProcessIdentity {
        realm: "test".into(),
        region: "local".into(),
        az: "local-a".into(),
        domain: "qa".into(),
        instance: "127.0.0.1".into(),
        app_name: "opcursor-tests".into(),
        app_version: "0.0.0".into(),
    }
}

pub struct Harness {
    pub instrumentation: Arc<Instrumentation>,
    pub latency: Arc<RecordingLatency>,
    pub logger: Arc<RecordingLogger>,
}

/// Instrumentation over recording sinks; the recording logger is the default.
pub fn harness() -> Harness {
    init_test_logging();
    let latency = Arc::new(RecordingLatency::default());
    let logger = Arc::new(RecordingLogger::default());
    let instrumentation = Instrumentation::new(
        Arc::new(LabelState::new(&test_identity())),
        latency.clone(),
    )
    .with_default_logger(logger.clone());

    Harness {
        instrumentation: Arc::new(instrumentation),
        latency,
        logger,
    }
}
