use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("PCM buffer is empty")]
    EmptyPcm,
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
