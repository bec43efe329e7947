//! Operation cursors.
//!
//! A [`Cursor`] times one operation from creation to [`Cursor::finish`],
//! classifies it as `OK` or `ERROR` and forwards one latency observation to
//! the [`LatencySink`]. Failures reported through the cursor are logged with
//! a truncated stack and counted on the bound [`EventSink`].
//!
//! ```text
//! Created ──observe_error──▶ Failed ──finish──▶ (observation emitted)
//!    └──────────────────finish─────────────────▶
//! ```

use crate::config::CursorConfig;
use crate::identity::ProcessIdentity;
use crate::labels::{EntryIdentity, LabelState, Status};
use crate::naming;
use crate::sink::{ErrorLogger, EventSink, LatencySink, PrometheusLatency, TracingLogger};
use crate::stack::StackCapture;
use crate::Result;
use prometheus::Registry;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Tag appended to the operation name for failure counters
pub const FAILURE_TAG: &str = "ERROR";

/// Shared instrumentation state: labels, latency sink, default logger and
/// stack capture settings. Cursors hold it by `Arc`.
pub struct Instrumentation {
    labels: Arc<LabelState>,
    latency: Arc<dyn LatencySink>,
    default_logger: RwLock<Arc<dyn ErrorLogger>>,
    stack: StackCapture,
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("labels", &self.labels)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl Instrumentation {
    /// Logs through [`TracingLogger`] and captures stacks with the default
    /// boundary until configured otherwise.
    pub fn new(labels: Arc<LabelState>, latency: Arc<dyn LatencySink>) -> Self {
        Self {
            labels,
            latency,
            default_logger: RwLock::new(Arc::new(TracingLogger)),
            stack: StackCapture::default(),
        }
    }

    /// Build from configuration and register the latency histogram on
    /// `registry`.
    pub fn from_config(
        config: &CursorConfig,
        identity: ProcessIdentity,
        registry: &Registry,
    ) -> Result<Arc<Self>> {
        let latency = PrometheusLatency::new(config)?;
        registry.register(Box::new(latency.vec().clone()))?;
        let identity = identity.merged_with(&config.identity);

        Ok(Arc::new(
            Self::new(Arc::new(LabelState::new(&identity)), Arc::new(latency))
                .with_stack_capture(StackCapture::from_config(config)),
        ))
    }

    pub fn with_default_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        *self
            .default_logger
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = logger;
        self
    }

    pub fn with_stack_capture(mut self, stack: StackCapture) -> Self {
        self.stack = stack;
        self
    }

    /// Start a cursor named after the calling function.
    ///
    /// Needs line tables in optimized builds and an `#[inline(never)]`
    /// caller; see [`naming`]. [`Instrumentation::start_named`] has neither
    /// requirement.
    #[inline(never)]
    pub fn start_cursor(self: &Arc<Self>) -> Cursor {
        let operation = naming::resolve(1);
        Cursor::new(Arc::clone(self), operation, None, None, None)
    }

    /// Start a cursor with an explicit operation name.
    pub fn start_named(self: &Arc<Self>, operation: impl Into<String>) -> Cursor {
        Cursor::new(Arc::clone(self), operation.into(), None, None, None)
    }

    /// Factory whose cursors carry the given collaborators and entry identity.
    pub fn scoped(
        self: &Arc<Self>,
        logger: Option<Arc<dyn ErrorLogger>>,
        events: Option<Arc<dyn EventSink>>,
        entry_name: impl Into<String>,
        entry_type: impl Into<String>,
    ) -> CursorFactory {
        CursorFactory {
            instrumentation: Arc::clone(self),
            logger,
            events,
            entry: EntryIdentity::new(entry_name, entry_type),
        }
    }

    /// Replace the global entry identity reported by unscoped cursors.
    pub fn override_identity(&self, entry_name: &str, entry_type: &str) {
        self.labels.override_identity(entry_name, entry_type);
    }

    /// Replace the logger used by cursors without a bound one. `None` is a
    /// no-op.
    pub fn override_default_logger(&self, logger: Option<Arc<dyn ErrorLogger>>) {
        if let Some(logger) = logger {
            *self
                .default_logger
                .write()
                .unwrap_or_else(PoisonError::into_inner) = logger;
        }
    }

    pub fn labels(&self) -> &Arc<LabelState> {
        &self.labels
    }

    pub fn latency_sink(&self) -> &Arc<dyn LatencySink> {
        &self.latency
    }

    pub fn stack_capture(&self) -> &StackCapture {
        &self.stack
    }

    fn default_logger(&self) -> Arc<dyn ErrorLogger> {
        Arc::clone(
            &self
                .default_logger
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// Produces cursors bound to one logger, event sink and entry identity.
#[derive(Clone)]
pub struct CursorFactory {
    instrumentation: Arc<Instrumentation>,
    logger: Option<Arc<dyn ErrorLogger>>,
    events: Option<Arc<dyn EventSink>>,
    entry: EntryIdentity,
}

impl fmt::Debug for CursorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorFactory")
            .field("entry", &self.entry)
            .field("logger", &self.logger.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl CursorFactory {
    /// Start a cursor named after the calling function.
    #[inline(never)]
    pub fn start_cursor(&self) -> Cursor {
        let operation = naming::resolve(1);
        self.start_named(operation)
    }

    pub fn start_named(&self, operation: impl Into<String>) -> Cursor {
        Cursor::new(
            Arc::clone(&self.instrumentation),
            operation.into(),
            Some(self.entry.clone()),
            self.logger.clone(),
            self.events.clone(),
        )
    }

    pub fn entry(&self) -> &EntryIdentity {
        &self.entry
    }
}

/// One in-flight operation. Finish it exactly once; dropping it unfinished
/// discards the observation.
#[must_use = "a cursor records nothing until `finish` is called"]
pub struct Cursor {
    instrumentation: Arc<Instrumentation>,
    start: Instant,
    operation: String,
    entry: Option<EntryIdentity>,
    last_error: Option<String>,
    logger: Option<Arc<dyn ErrorLogger>>,
    events: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("operation", &self.operation)
            .field("entry", &self.entry)
            .field("status", &self.status())
            .field("elapsed", &self.elapsed())
            .finish_non_exhaustive()
    }
}

impl Cursor {
    fn new(
        instrumentation: Arc<Instrumentation>,
        operation: String,
        entry: Option<EntryIdentity>,
        logger: Option<Arc<dyn ErrorLogger>>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            instrumentation,
            start: Instant::now(),
            operation,
            entry,
            last_error: None,
            logger,
            events,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn entry(&self) -> Option<&EntryIdentity> {
        self.entry.as_ref()
    }

    pub fn status(&self) -> Status {
        if self.last_error.is_some() {
            Status::Error
        } else {
            Status::Ok
        }
    }

    /// Message of the most recently reported error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Report a failure and hand the error back, for use as
    /// `return Err(cursor.observe_error(err))`.
    ///
    /// Every call logs the message with the caller's stack and increments
    /// `<operation>_ERROR` on the bound event sink.
    #[track_caller]
    #[inline(never)]
    pub fn observe_error<E: fmt::Display>(&mut self, err: E) -> E {
        self.record_failure(err.to_string(), Location::caller(), 2);
        err
    }

    /// Pass a result through, reporting it when it is an `Err`. `Ok` has no
    /// side effects.
    #[track_caller]
    #[inline(never)]
    pub fn observe_result<T, E: fmt::Display>(
        &mut self,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        if let Err(err) = &result {
            self.record_failure(err.to_string(), Location::caller(), 2);
        }
        result
    }

    /// `skip` counts frames between this function and the reporting caller.
    #[inline(never)]
    fn record_failure(&mut self, message: String, origin: &Location<'_>, skip: usize) {
        let mut text = String::with_capacity(message.len() + 1024);
        text.push_str(&message);
        text.push('\n');
        self.last_error = Some(message);

        let frames = self.instrumentation.stack.capture(skip);
        for line in StackCapture::render(&frames) {
            text.push_str(&line);
            text.push('\n');
        }

        match &self.logger {
            Some(logger) => logger.error(&text, origin),
            None => self.instrumentation.default_logger().error(&text, origin),
        }

        if let Some(events) = &self.events {
            events.inc_counter(&format!("{}_{}", self.operation, FAILURE_TAG), 1);
        }
    }

    /// Emit the latency observation. Sink failures are dropped.
    pub fn finish(self) {
        let elapsed_nanos = self.start.elapsed().as_nanos() as f64;
        let labels = self.instrumentation.labels.snapshot_for(
            &self.operation,
            self.entry.as_ref(),
            self.status(),
        );

        if let Err(e) = self.instrumentation.latency.observe(&labels, elapsed_nanos) {
            debug!("Dropping observation for {}: {}", self.operation, e);
        }
    }
}
