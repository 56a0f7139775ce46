use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication required")]
    AuthRequired,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("too many attempts")]
    Throttled,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token invalid or expired")]
    InvalidToken,
}

pub type Result<T> = std::result::Result<T, AuthError>;
