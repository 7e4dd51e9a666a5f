/// Errors at the configuration and input-loading boundary.
///
/// Scoring entry points never return these: they encode availability in
/// their results instead.
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for configuration and input loading
pub type Result<T> = std::result::Result<T, AssessError>;
