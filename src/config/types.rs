use serde::{Deserialize, Serialize};

/// Path fragments that mark a frame as dependency or toolchain source.
pub const DEFAULT_EXTERNAL_PATH_MARKERS: &[&str] = &[
    "/.cargo/registry/",
    "/.cargo/git/",
    "/rustc/",
    "/library/std/src/",
    "/library/core/src/",
    "/library/alloc/src/",
];

/// Deepest stack walk rendered into a failure report
pub const DEFAULT_MAX_STACK_DEPTH: usize = 32;

/// Settings for an instrumentation handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Metric namespace prefix
    pub namespace: String,

    /// Metric subsystem
    pub subsystem: String,

    /// Metric name, the observed value is elapsed nanoseconds
    pub metric_name: String,

    /// Help text registered with the latency histogram
    pub help: String,

    /// Histogram buckets in nanoseconds, strictly increasing
    pub buckets: Vec<f64>,

    /// Maximum number of frames rendered for a failure
    pub max_stack_depth: usize,

    /// Frames whose source path contains any of these are treated as external
    pub external_path_markers: Vec<String>,

    /// Identity values that replace the environment-derived ones
    #[serde(skip_serializing_if = "IdentityOverrides::is_empty")]
    pub identity: IdentityOverrides,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            namespace: "app".to_string(),
            subsystem: "cursor".to_string(),
            metric_name: "elapsed_nanos".to_string(),
            help: "Elapsed nanoseconds of instrumented operations".to_string(),
            buckets: default_buckets(),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            external_path_markers: DEFAULT_EXTERNAL_PATH_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            identity: IdentityOverrides::default(),
        }
    }
}

/// 1µs to roughly 67s, factor 4.
fn default_buckets() -> Vec<f64> {
    let mut buckets = Vec::with_capacity(14);
    let mut bound = 1_000.0;
    for _ in 0..14 {
        buckets.push(bound);
        bound *= 4.0;
    }
    buckets
}

/// Optional replacements for the process identity facts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl IdentityOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
