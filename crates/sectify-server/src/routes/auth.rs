use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::Utc;
use sectify_auth::{hash_password, verify_password, Purpose, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::bearer_token;
use crate::ids::random_session_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    user_id: Uuid,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Invalid("name, email and password are required".into()));
    }
    if state.user_store().by_email(&req.email).is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password = req.password.clone();
    let password_hash = state
        .run_cpu_bound(move || hash_password(&password))
        .await?
        .map_err(|_| ApiError::Invalid("password could not be hashed".into()))?;

    let user = User {
        user_id: Uuid::new_v4(),
        email: req.email,
        password_hash,
        mfa_secret: None,
        created_at: Utc::now(),
    };
    let user_id = user.user_id;
    state.user_store().insert(user);

    Ok((StatusCode::CREATED, Json(SignupResponse { user_id })))
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct MfaRequiredResponse {
    mfa_required: bool,
    mfa_token: String,
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if state.login_throttle().is_throttled(&form.username) {
        return Err(ApiError::Throttled);
    }

    let Some(user) = state.user_store().by_email(&form.username) else {
        // Still record a failure so a bad email can't be used to skip the
        // throttle that protects real accounts from guessing.
        state.login_throttle().record_failure(&form.username);
        return Err(ApiError::AuthRequired);
    };

    let password = form.password.clone();
    let hash = user.password_hash.clone();
    let verified = state.run_cpu_bound(move || verify_password(&password, &hash)).await?;
    if verified.is_err() {
        state.login_throttle().record_failure(&form.username);
        return Err(ApiError::AuthRequired);
    }
    state.login_throttle().record_success(&form.username);

    let ip = addr.ip().to_string();
    let session_id = random_session_id();

    if let Some(mfa_secret) = &user.mfa_secret {
        let _ = mfa_secret;
        let mfa_token = state
            .token_service()
            .issue_mfa_token(user.user_id, &session_id, &ip)
            .map_err(ApiError::from)?;
        Ok(Json(MfaRequiredResponse {
            mfa_required: true,
            mfa_token,
        })
        .into_response())
    } else {
        let access_token = state
            .token_service()
            .issue_access_token(user.user_id, &session_id, &ip)
            .map_err(ApiError::from)?;
        Ok(Json(AccessTokenResponse { access_token }).into_response())
    }
}

#[derive(Deserialize)]
pub struct Verify2faRequest {
    code: String,
}

pub async fn verify_2fa(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<Verify2faRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::AuthRequired)?;
    let ip = addr.ip().to_string();

    let claims = state
        .token_service()
        .verify(token, Purpose::MfaVerification, Some(&ip))
        .map_err(ApiError::from)?;
    let user = state.user_store().by_id(claims.sub).ok_or(ApiError::AuthRequired)?;
    let mfa_secret = user.mfa_secret.as_deref().ok_or(ApiError::AuthRequired)?;

    let now = Utc::now().timestamp().max(0) as u64;
    if !sectify_auth::verify_totp(mfa_secret, &req.code, now) {
        return Err(ApiError::Invalid("invalid verification code".into()));
    }

    let session_id = random_session_id();
    let access_token = state
        .token_service()
        .issue_access_token(user.user_id, &session_id, &ip)
        .map_err(ApiError::from)?;
    Ok(Json(AccessTokenResponse { access_token }))
}
