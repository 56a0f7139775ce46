//! Translates internal error sum types into a problem+json shape in one
//! place, so no handler hand-rolls a status code.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Serialize)]
struct ProblemBody {
    kind: &'static str,
    message: String,
}

/// The handler-facing error sum type. Every variant maps to exactly one
/// HTTP status and `kind` string; construction sites choose the variant,
/// this module is the only place that knows the status code.
#[derive(Debug)]
pub enum ApiError {
    AuthRequired,
    Forbidden,
    NotFound,
    Invalid(String),
    Conflict(String),
    IntegrityError,
    Throttled,
    Transient(String),
    /// The bounded worker pool's input queue is full. Distinct from
    /// `Throttled` even though both surface as 429/503: this one always
    /// carries `Retry-After`.
    Busy,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::AuthRequired => (StatusCode::UNAUTHORIZED, "AuthRequired", "authentication required".into()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden", "forbidden".into()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NotFound", "not found".into()),
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, "Invalid", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg.clone()),
            // Never exposes detail to the client; detail is only logged
            // server-side by the call site that constructs this.
            ApiError::IntegrityError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IntegrityError",
                "internal integrity check failed".into(),
            ),
            ApiError::Throttled => (StatusCode::TOO_MANY_REQUESTS, "Throttled", "too many attempts".into()),
            ApiError::Transient(msg) => (StatusCode::SERVICE_UNAVAILABLE, "Transient", msg.clone()),
            ApiError::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Throttled",
                "worker queue is full, retry shortly".into(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let is_busy = matches!(self, ApiError::Busy);
        let (status, kind, message) = self.parts();
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(kind, "internal error surfaced to client");
        }
        let mut response = (status, Json(ProblemBody { kind, message })).into_response();
        if is_busy {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from_static("2"));
        }
        response
    }
}

impl From<sectify_auth::AuthError> for ApiError {
    fn from(err: sectify_auth::AuthError) -> Self {
        use sectify_auth::AuthError;
        match err {
            AuthError::AuthRequired => ApiError::AuthRequired,
            AuthError::Forbidden => ApiError::Forbidden,
            AuthError::NotFound => ApiError::NotFound,
            AuthError::Throttled => ApiError::Throttled,
            AuthError::InvalidCredentials => ApiError::AuthRequired,
            AuthError::InvalidToken => ApiError::AuthRequired,
        }
    }
}

impl From<sectify_hls::AliasResolveError> for ApiError {
    fn from(err: sectify_hls::AliasResolveError) -> Self {
        use sectify_hls::AliasResolveError;
        match err {
            // Binding failures never distinguish "alias does not exist"
            // from "exists but bound elsewhere" in the response.
            AliasResolveError::Denied => ApiError::Forbidden,
            AliasResolveError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<sectify_core::CoreError> for ApiError {
    fn from(err: sectify_core::CoreError) -> Self {
        tracing::error!(error = %err, "at-rest cipher failure");
        ApiError::IntegrityError
    }
}

impl From<sectify_hls::HlsError> for ApiError {
    fn from(err: sectify_hls::HlsError) -> Self {
        tracing::error!(error = %err, "packaging failure");
        ApiError::Transient("packaging temporarily unavailable".into())
    }
}
