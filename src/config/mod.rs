//! Instrumentation settings: metric naming, histogram buckets, stack capture
//! limits and identity overrides.

pub mod loader;
pub mod types;

pub use types::{
    CursorConfig, IdentityOverrides, DEFAULT_EXTERNAL_PATH_MARKERS, DEFAULT_MAX_STACK_DEPTH,
};
