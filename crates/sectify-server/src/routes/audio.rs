use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use sectify_core::{derive_key, encrypt_envelope, file_at_rest_salt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::bearer_token;
use crate::state::AppState;

#[derive(Serialize)]
pub struct TrackSummary {
    track_id: Uuid,
    owner_id: Uuid,
    title: String,
    is_public: bool,
    created_at: DateTime<Utc>,
}

pub async fn list_public_tracks(State(state): State<AppState>) -> Json<Vec<TrackSummary>> {
    let tracks = state.track_store().public_tracks();
    Json(
        tracks
            .into_iter()
            .map(|t| TrackSummary {
                track_id: t.track_id,
                owner_id: t.owner_id,
                title: t.title,
                is_public: t.is_public,
                created_at: t.created_at,
            })
            .collect(),
    )
}

#[derive(Serialize)]
pub struct UploadResponse {
    track_id: Uuid,
}

/// Accepts raw little-endian 16-bit PCM via the `file` multipart field
/// (the subprocess that would transcode an arbitrary container into this
/// form is an external tool, out of scope here), derives a per-track key,
/// and writes the at-rest ciphertext envelope — plaintext audio never
/// touches disk.
pub async fn upload(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::AuthRequired)?;
    let ip = addr.ip().to_string();
    let claims = state
        .token_service()
        .verify(token, sectify_auth::Purpose::Access, Some(&ip))
        .map_err(ApiError::from)?;
    let owner_id = claims.sub;

    let mut title: Option<String> = None;
    let mut is_public = false;
    let mut pcm: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Invalid("malformed multipart body".into()))?
    {
        match field.name() {
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::Invalid("invalid title field".into()))?,
                )
            }
            Some("is_public") => {
                let raw = field.text().await.unwrap_or_default();
                is_public = raw.eq_ignore_ascii_case("true") || raw == "1";
            }
            Some("file") => {
                pcm = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|_| ApiError::Invalid("invalid file field".into()))?
                        .to_vec(),
                )
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let title = title.ok_or_else(|| ApiError::Invalid("title is required".into()))?;
    let pcm = pcm.ok_or_else(|| ApiError::Invalid("file is required".into()))?;
    if title.trim().is_empty() {
        return Err(ApiError::Invalid("title must not be empty".into()));
    }
    if pcm.is_empty() {
        return Err(ApiError::Invalid("uploaded file is empty".into()));
    }

    let track_id = Uuid::new_v4();

    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(&pcm);
        hex::encode(hasher.finalize())
    };

    let owner_id_str = owner_id.to_string();
    let track_id_str = track_id.to_string();
    let state_for_crypto = state.clone();
    let envelope = state
        .run_cpu_bound(move || {
            let salt = file_at_rest_salt(&owner_id_str, &track_id_str);
            let file_key = derive_key(state_for_crypto.master_secret(), sectify_core::Purpose::FileAtRest, &salt);
            encrypt_envelope(&pcm, &file_key)
        })
        .await?;

    let path = state.upload_root().join(format!("{track_id}.enc"));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
    }
    tokio::fs::write(&path, &envelope)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    let track = sectify_auth::Track {
        track_id,
        owner_id,
        title,
        is_public,
        ciphertext_path: path.display().to_string(),
        content_hash,
        created_at: Utc::now(),
    };
    state.track_store().insert(track);

    Ok((StatusCode::CREATED, Json(UploadResponse { track_id })))
}
