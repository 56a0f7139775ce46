//! Orchestrator: the axum HTTP surface, wiring the crypto, HLS,
//! watermarking, authorization and reaper pieces behind `AppState`.

pub mod config;
pub mod error;
pub mod extract;
pub mod ids;
pub mod pcm;
pub mod routes;
pub mod state;
pub mod throttle;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

pub use config::Config;
pub use state::AppState;

/// Attaches a fresh `request_id` to every request's tracing span. Crypto
/// failures logged downstream via `tracing::error!` carry this span's
/// request id; nothing in this span ever includes the master secret or a
/// derived key.
async fn request_id_span(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let span = tracing::info_span!("request", %request_id, %method, %path);
    next.run(request).instrument(span).await
}

/// Builds the full `/api/v1` router over `state`.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/login/verify-2fa", post(routes::auth::verify_2fa))
        .route("/audio/tracks/public", get(routes::audio::list_public_tracks))
        .route("/audio/upload", post(routes::audio::upload))
        .route("/stream/playlist/:track_id", get(routes::stream::playlist))
        .route(
            "/stream/segment/:track_id/:session/:index",
            get(routes::stream::segment),
        )
        .route("/stream/key/:alias", get(routes::stream::key));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(request_id_span))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
