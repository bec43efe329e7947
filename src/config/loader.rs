use super::types::CursorConfig;
use crate::{CursorError, Result};
use anyhow::Context;
use std::path::Path;
use tracing::debug;

impl CursorConfig {
    /// Parse and validate a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: CursorConfig = serde_yaml_ng::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cursor config {}", path.display()))?;
        let config = Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse cursor config {}", path.display()))?;
        debug!("Loaded cursor config from {}", path.display());
        Ok(config)
    }

    /// Reject settings the metrics and stack layers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.metric_name.trim().is_empty() {
            return Err(CursorError::Config("metric_name must not be empty".into()));
        }
        if self.max_stack_depth == 0 {
            return Err(CursorError::Config(
                "max_stack_depth must be at least 1".into(),
            ));
        }
        if self.buckets.is_empty() {
            return Err(CursorError::Config("buckets must not be empty".into()));
        }
        if !self.buckets.windows(2).all(|w| w[0] < w[1]) {
            return Err(CursorError::Config(
                "buckets must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}
