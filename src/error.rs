use thiserror::Error;

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Label arity mismatch: expected {expected} values, got {actual}")]
    LabelArity { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CursorError>;
