use thiserror::Error;

/// Caller-misuse and configuration errors.
///
/// Internal bookkeeping violations are not represented here: they panic.
#[derive(Debug, Error)]
pub enum ChunkyError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} was used after being disposed")]
    Disposed(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ChunkyError>;
