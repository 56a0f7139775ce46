use thiserror::Error;

/// Errors surfaced by key derivation and the at-rest chaotic cipher.
///
/// `IntegrityError` is deliberately opaque: callers must not learn whether
/// the HMAC mismatch came from a truncated file, a flipped byte, or a
/// wrong key.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("ciphertext envelope failed integrity verification")]
    IntegrityError,

    #[error("envelope too short to contain a valid header")]
    TruncatedEnvelope,

    #[error("unrecognized envelope magic or version")]
    BadMagic,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
