//! Process-wide default instrumentation for zero-configuration use.
//!
//! Built lazily on first use from [`CursorConfig::default`] and
//! [`ProcessIdentity::from_env`], with its histogram registered on the
//! Prometheus default registry. Code that needs its own labels or sinks
//! should build an [`Instrumentation`] and pass it around instead.

use crate::config::CursorConfig;
use crate::cursor::{Cursor, CursorFactory, Instrumentation};
use crate::identity::ProcessIdentity;
use crate::labels::LabelState;
use crate::naming;
use crate::sink::{ErrorLogger, EventSink, PrometheusLatency};
use once_cell::sync::Lazy;
use prometheus::HistogramVec;
use std::sync::Arc;
use tracing::debug;

struct ProcessDefault {
    instrumentation: Arc<Instrumentation>,
    latency: PrometheusLatency,
}

static DEFAULT: Lazy<ProcessDefault> = Lazy::new(|| {
    let config = CursorConfig::default();
    let identity = ProcessIdentity::from_env().merged_with(&config.identity);

    let latency =
        PrometheusLatency::new(&config).expect("default cursor config is valid");
    if let Err(e) = prometheus::register(Box::new(latency.vec().clone())) {
        debug!("Cursor histogram not registered on default registry: {}", e);
    }

    let instrumentation = Instrumentation::new(
        Arc::new(LabelState::new(&identity)),
        Arc::new(latency.clone()),
    );

    ProcessDefault {
        instrumentation: Arc::new(instrumentation),
        latency,
    }
});

/// The process-wide instrumentation handle
pub fn default_instrumentation() -> &'static Arc<Instrumentation> {
    &DEFAULT.instrumentation
}

/// Start a cursor on the default instrumentation, named after the caller.
/// Prefer [`start_named`] unless the build keeps line tables; see
/// [`crate::naming`].
#[inline(never)]
pub fn start_cursor() -> Cursor {
    let operation = naming::resolve(1);
    DEFAULT.instrumentation.start_named(operation)
}

/// Start a cursor on the default instrumentation with an explicit name.
pub fn start_named(operation: impl Into<String>) -> Cursor {
    DEFAULT.instrumentation.start_named(operation)
}

/// Factory on the default instrumentation bound to the given collaborators
/// and entry identity.
pub fn scoped_factory(
    logger: Option<Arc<dyn ErrorLogger>>,
    events: Option<Arc<dyn EventSink>>,
    entry_name: impl Into<String>,
    entry_type: impl Into<String>,
) -> CursorFactory {
    DEFAULT
        .instrumentation
        .scoped(logger, events, entry_name, entry_type)
}

pub fn override_identity(entry_name: &str, entry_type: &str) {
    DEFAULT
        .instrumentation
        .override_identity(entry_name, entry_type);
}

/// `None` leaves the current default logger in place.
pub fn override_default_logger(logger: Option<Arc<dyn ErrorLogger>>) {
    DEFAULT.instrumentation.override_default_logger(logger);
}

/// Histogram vector behind the default instrumentation
pub fn histogram_vec() -> &'static HistogramVec {
    DEFAULT.latency.vec()
}
