//! Per-operation instrumentation cursors.
//!
//! A cursor wraps one unit of work: it measures wall-clock latency, tags the
//! observation with process identity plus the operation name and outcome,
//! and on failure logs the error with a stack trace truncated at the first
//! dependency frame.
//!
//! ```no_run
//! fn place_order(id: u64) -> Result<(), String> {
//!     let mut cursor = opcursor::start_named("place_order");
//!     let result = cursor.observe_result(if id == 0 {
//!         Err("missing order id".to_string())
//!     } else {
//!         Ok(())
//!     });
//!     cursor.finish();
//!     result
//! }
//! ```
//!
//! # Derived operation names
//!
//! [`start_named`] is the primary entry point. [`start_cursor`] derives the
//! name from the calling function instead, which depends on the build:
//!
//! - optimized profiles need line tables (`debug = "line-tables-only"` or
//!   more), otherwise every derived name is `unknown` and failure stacks
//!   have no file locations;
//! - the measured function should be `#[inline(never)]` and must not end in
//!   a tail call to `start_cursor`, or a different frame gets named.
//!
//! ```no_run
//! #[inline(never)]
//! fn reconcile_accounts() {
//!     let cursor = opcursor::start_cursor();
//!     // ...
//!     cursor.finish();
//! }
//! ```
//!
//! See [`naming`] for the frame-skip contract wrappers must follow.

pub mod config;
pub mod cursor;
pub mod error;
pub mod global;
pub mod identity;
pub mod labels;
pub mod naming;
pub mod sink;
pub mod stack;

pub use config::CursorConfig;
pub use cursor::{Cursor, CursorFactory, Instrumentation, FAILURE_TAG};
pub use error::{CursorError, Result};
pub use global::{
    default_instrumentation, histogram_vec, override_default_logger, override_identity,
    scoped_factory, start_cursor, start_named,
};
pub use identity::ProcessIdentity;
pub use labels::{EntryIdentity, LabelState, Status};
pub use sink::{ErrorLogger, EventSink, LatencySink, PrometheusEvents, PrometheusLatency, TracingLogger};
pub use stack::{StackCapture, StackFrame};
