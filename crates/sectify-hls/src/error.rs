use thiserror::Error;

#[derive(Debug, Error)]
pub enum HlsError {
    #[error("segment encryption failure")]
    Crypto,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pcm buffer is empty")]
    EmptyPcm,
}

pub type Result<T> = std::result::Result<T, HlsError>;

/// Outcome of resolving a [`crate::alias_store::Alias`] to its segment key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasResolveError {
    /// IP or owner binding check failed for an alias that does exist.
    #[error("access denied")]
    Denied,
    #[error("alias not found or expired")]
    NotFound,
}
