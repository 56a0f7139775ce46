use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ReaperError>;
