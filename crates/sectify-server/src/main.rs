use std::net::SocketAddr;

use sectify_server::{build_router, AppState, Config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn fail_fast(message: impl std::fmt::Display) -> ! {
    eprintln!("sectify-server: invalid configuration: {message}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => fail_fast(e),
    };

    let bind_addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => fail_fast(format!("BIND_ADDR is not a valid socket address: {e}")),
    };

    let reaper_cancel = CancellationToken::new();
    let reaper_config = sectify_reaper::ReaperConfig {
        hls_root: config.hls_root.clone(),
        interval: std::time::Duration::from_secs(config.reaper_interval_secs),
        age: std::time::Duration::from_secs(config.reaper_age_secs),
    };
    let reaper_handle = tokio::spawn(sectify_reaper::run(reaper_config, reaper_cancel.clone()));

    let state = AppState::new(&config, reaper_cancel.clone());
    let app = build_router(state);

    tracing::info!(%bind_addr, "sectify-server: listening");

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => fail_fast(format!("failed to bind {bind_addr}: {e}")),
    };

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = serve.await {
        tracing::error!(error = %e, "sectify-server: server error");
    }

    reaper_cancel.cancel();
    let _ = reaper_handle.await;
    tracing::info!("sectify-server: shut down, master secret zeroed on drop");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("sectify-server: shutdown signal received");
}
