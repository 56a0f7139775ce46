use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sectify_auth::Operation;
use sectify_core::{derive_key, file_at_rest_salt};
use sectify_hls::MediaPlaylist;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{bearer_token, ip_to_prefix};
use crate::ids::{session_hex, session_uuid};
use crate::pcm::{bytes_to_samples, samples_to_bytes};
use crate::state::AppState;

const SAMPLE_RATE_HZ: u32 = 44_100;
const CHANNELS: u16 = 2;
const BYTES_PER_SAMPLE: u16 = 2;

/// Resolves the optional caller identity from a bearer access token. A
/// header that parses but fails verification is a hard auth failure
/// rather than silently falling back to anonymous — a forged or expired
/// token must not be treated as "no credential presented".
fn authenticated_user(
    state: &AppState,
    headers: &HeaderMap,
    ip: &str,
) -> Result<Option<Uuid>, ApiError> {
    match bearer_token(headers) {
        None => Ok(None),
        Some(token) => {
            let claims = state
                .token_service()
                .verify(token, sectify_auth::Purpose::Access, Some(ip))
                .map_err(ApiError::from)?;
            Ok(Some(claims.sub))
        }
    }
}

/// GET /stream/playlist/{track_id}: authorizes, decrypts the source,
/// watermarks it for this session, packages it into AES-128 segments, and
/// serves a manifest whose key URI resolves through a freshly minted
/// alias, minted only after the authorizing grant exists.
///
/// On-disk segments are nested under the session
/// (`<HLS_ROOT>/<track_id>/<session_hex>/`) rather than a flat per-track
/// directory: the per-session watermark and the per-`(track_id,
/// session_id)` idempotent packaging both need a session component
/// somewhere in the path, and the client only ever follows the URIs the
/// manifest gives it.
pub async fn playlist(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(track_id_raw): Path<String>,
) -> Result<Response, ApiError> {
    let track_id = Uuid::parse_str(&track_id_raw).map_err(|_| ApiError::NotFound)?;
    let ip = addr.ip().to_string();
    let user_id = authenticated_user(&state, &headers, &ip)?;

    let (track, grant) = state
        .auth_service()
        .check_track_access(track_id, user_id, Operation::Stream, ip_to_prefix(addr.ip()))
        .map_err(ApiError::from)?;

    let envelope_path = state.upload_root().join(format!("{track_id}.enc"));
    let envelope = tokio::fs::read(&envelope_path)
        .await
        .map_err(|_| ApiError::NotFound)?;

    let owner_id = track.owner_id.to_string();
    let track_id_str = track_id.to_string();
    let state_for_kdf = state.clone();
    let file_key = state
        .run_cpu_bound(move || {
            let salt = file_at_rest_salt(&owner_id, &track_id_str);
            derive_key(state_for_kdf.master_secret(), sectify_core::Purpose::FileAtRest, &salt)
        })
        .await?;

    let session_id = grant.session_id;
    let session_dir = state
        .hls_root()
        .join(track_id.to_string())
        .join(session_hex(&session_id));

    let packaged = state
        .packaging()
        .get_or_package(track_id, session_uuid(&session_id), || {
            let envelope = envelope.clone();
            let session_dir = session_dir.clone();
            let state = state.clone();
            async move {
                let packed = state
                    .run_cpu_bound(move || {
                        let pcm = sectify_core::decrypt_envelope(&envelope, &file_key)
                            .map_err(|_| sectify_hls::HlsError::Crypto)?;
                        let mut samples = bytes_to_samples(&pcm);
                        sectify_watermark::embed_watermark(&mut samples, &session_id)
                            .map_err(|_| sectify_hls::HlsError::EmptyPcm)?;
                        let watermarked = samples_to_bytes(&samples);
                        sectify_hls::packager::package_pcm(
                            &watermarked,
                            SAMPLE_RATE_HZ,
                            CHANNELS,
                            BYTES_PER_SAMPLE,
                        )
                    })
                    .await
                    .map_err(|_| sectify_hls::HlsError::Crypto)??;
                sectify_hls::packager::write_packaged_track(&session_dir, &packed).await?;
                Ok(packed)
            }
        })
        .await
        .map_err(ApiError::from)?;

    let allowed_ip_hash = state.token_service().ip_hash_bytes(&ip);
    let owner_for_binding = if track.is_public {
        None
    } else {
        Some(track.owner_id.to_string())
    };
    let alias = state.alias_store().mint(
        packaged.segment_key,
        track_id,
        owner_for_binding,
        allowed_ip_hash,
    );

    let key_uri = format!("/api/v1/stream/key/{alias}");
    let segment_uri_prefix = format!(
        "/api/v1/stream/segment/{track_id}/{}",
        session_hex(&session_id)
    );
    let manifest = MediaPlaylist::new(&packaged.segments, key_uri, segment_uri_prefix).render();

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        manifest,
    )
        .into_response())
}

/// GET /stream/segment/{track_id}/{session}/{n}: serves the ciphertext
/// segment bytes as-is. The segment alone is useless without the key
/// released through `/stream/key/{alias}`.
pub async fn segment(
    State(state): State<AppState>,
    Path((track_id, session, index)): Path<(String, String, u32)>,
) -> Result<Response, ApiError> {
    let track_id = Uuid::parse_str(&track_id).map_err(|_| ApiError::NotFound)?;
    if session.len() != 64 || !session.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ApiError::NotFound);
    }
    let dir = state.hls_root().join(track_id.to_string()).join(session);
    let path = sectify_hls::packager::segment_path(&dir, index);

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound
        } else {
            ApiError::Transient(e.to_string())
        }
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "video/mp2t")],
        Bytes::from(bytes),
    )
        .into_response())
}

/// GET /stream/key/{alias}: resolves the alias to its raw 16-byte segment
/// key under IP/owner binding. Denied and not-found both surface with no
/// indication of which applied, beyond their differing status codes.
pub async fn key(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(alias): Path<String>,
) -> Result<Response, ApiError> {
    let ip = addr.ip().to_string();
    let caller_user_id = authenticated_user(&state, &headers, &ip)?;
    let caller_ip_hash = state.token_service().ip_hash_bytes(&ip);

    let segment_key = state
        .alias_store()
        .resolve(&alias, caller_ip_hash, caller_user_id.map(|u| u.to_string()).as_deref())
        .map_err(ApiError::from)?;

    Ok((StatusCode::OK, Bytes::copy_from_slice(&segment_key)).into_response())
}
