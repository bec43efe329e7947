//! Collaborators a cursor reports to.
//!
//! All three are best-effort: the cursor swallows every failure they report,
//! so a broken sink never changes the outcome of the measured operation.

use crate::config::CursorConfig;
use crate::labels::LabelState;
use crate::{CursorError, Result};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use std::fmt;
use std::panic::Location;

/// Latency aggregator keyed by the full label vector.
pub trait LatencySink: Send + Sync {
    /// Record one observation. Fails when no series exists or can be created
    /// for these label values.
    fn observe(&self, labels: &[String], value: f64) -> Result<()>;
}

/// Receives pre-formatted failure reports at error severity.
pub trait ErrorLogger: Send + Sync {
    /// `origin` is the source location that reported the failure.
    fn error(&self, text: &str, origin: &Location<'_>);
}

/// Fire-and-forget named counters.
pub trait EventSink: Send + Sync {
    fn inc_counter(&self, name: &str, amount: u64);
}

/// Prometheus histogram of elapsed nanoseconds.
#[derive(Clone)]
pub struct PrometheusLatency {
    vec: HistogramVec,
}

impl fmt::Debug for PrometheusLatency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusLatency").finish_non_exhaustive()
    }
}

impl PrometheusLatency {
    /// Build an unregistered histogram vector labelled with
    /// [`LabelState::label_names`].
    pub fn new(config: &CursorConfig) -> Result<Self> {
        config.validate()?;
        let opts = HistogramOpts::new(config.metric_name.clone(), config.help.clone())
            .namespace(config.namespace.clone())
            .subsystem(config.subsystem.clone())
            .buckets(config.buckets.clone());
        let vec = HistogramVec::new(opts, &LabelState::label_names())?;
        Ok(Self { vec })
    }

    /// Underlying vector, for registration and export
    pub fn vec(&self) -> &HistogramVec {
        &self.vec
    }
}

impl LatencySink for PrometheusLatency {
    fn observe(&self, labels: &[String], value: f64) -> Result<()> {
        check_arity(labels)?;
        let values: Vec<&str> = labels.iter().map(String::as_str).collect();
        let histogram = self.vec.get_metric_with_label_values(&values)?;
        histogram.observe(value);
        Ok(())
    }
}

/// Event counters as one Prometheus counter vector labelled by `event`.
#[derive(Clone)]
pub struct PrometheusEvents {
    vec: IntCounterVec,
}

impl fmt::Debug for PrometheusEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusEvents").finish_non_exhaustive()
    }
}

impl PrometheusEvents {
    pub fn new(namespace: &str, subsystem: &str) -> Result<Self> {
        let opts = Opts::new("events_total", "Events counted by instrumented operations")
            .namespace(namespace.to_string())
            .subsystem(subsystem.to_string());
        let vec = IntCounterVec::new(opts, &["event"])?;
        Ok(Self { vec })
    }

    pub fn vec(&self) -> &IntCounterVec {
        &self.vec
    }

    pub fn count(&self, name: &str) -> u64 {
        self.vec
            .get_metric_with_label_values(&[name])
            .map(|counter| counter.get())
            .unwrap_or(0)
    }
}

impl EventSink for PrometheusEvents {
    fn inc_counter(&self, name: &str, amount: u64) {
        if let Ok(counter) = self.vec.get_metric_with_label_values(&[name]) {
            counter.inc_by(amount);
        }
    }
}

/// Default logger: emits through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn error(&self, text: &str, origin: &Location<'_>) {
        tracing::error!(target: "opcursor", origin = %origin, "{}", text);
    }
}

/// Reject label sets that do not line up with [`LabelState::label_names`].
pub fn check_arity(labels: &[String]) -> Result<()> {
    let expected = LabelState::label_names().len();
    if labels.len() != expected {
        return Err(CursorError::LabelArity {
            expected,
            actual: labels.len(),
        });
    }
    Ok(())
}
