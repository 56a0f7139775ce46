//! Orchestrator: the single `AppState` wiring the crypto, HLS,
//! watermarking, authorization and reaper pieces behind the HTTP
//! surface. Cloning is cheap (an `Arc` around one inner struct) so every
//! handler takes it by value via axum's `State` extractor — no ambient
//! singleton.

use std::path::PathBuf;
use std::sync::Arc;

use sectify_auth::{AuthorizationService, GrantStore, InMemoryTrackStore, InMemoryUserStore, TokenService, TrackStore, UserStore};
use sectify_core::MasterSecret;
use sectify_hls::{KeyAliasStore, PackagingCoordinator};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ApiError;
use crate::throttle::LoginThrottle;

struct Inner {
    hls_root: PathBuf,
    upload_root: PathBuf,
    master_secret: MasterSecret,
    token_service: TokenService,
    user_store: Arc<dyn UserStore>,
    track_store: Arc<dyn TrackStore>,
    auth_service: AuthorizationService,
    alias_store: KeyAliasStore,
    packaging: PackagingCoordinator,
    login_throttle: LoginThrottle,
    worker_permits: Arc<Semaphore>,
    reaper_cancel: CancellationToken,
}

#[derive(Clone)]
pub struct AppState(Arc<Inner>);

impl AppState {
    pub fn new(config: &Config, reaper_cancel: CancellationToken) -> Self {
        let user_store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let track_store: Arc<dyn TrackStore> = Arc::new(InMemoryTrackStore::new());
        let grants = Arc::new(GrantStore::new());
        let auth_service = AuthorizationService::new(track_store.clone(), grants);

        let access_ttl_secs = config.token_ttl_access_min * 60;
        let mfa_ttl_secs = config.token_ttl_mfa_min * 60;
        let token_service = TokenService::with_ttls(&config.master_secret, access_ttl_secs, mfa_ttl_secs);

        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self(Arc::new(Inner {
            hls_root: config.hls_root.clone(),
            upload_root: config.upload_root.clone(),
            master_secret: MasterSecret::new(config.master_secret.clone()),
            token_service,
            user_store,
            track_store,
            auth_service,
            alias_store: KeyAliasStore::new(),
            packaging: PackagingCoordinator::new(),
            login_throttle: LoginThrottle::new(),
            worker_permits: Arc::new(Semaphore::new(worker_count)),
            reaper_cancel,
        }))
    }

    pub fn hls_root(&self) -> &std::path::Path {
        &self.0.hls_root
    }

    pub fn upload_root(&self) -> &std::path::Path {
        &self.0.upload_root
    }

    pub fn master_secret(&self) -> &MasterSecret {
        &self.0.master_secret
    }

    pub fn token_service(&self) -> &TokenService {
        &self.0.token_service
    }

    pub fn user_store(&self) -> &Arc<dyn UserStore> {
        &self.0.user_store
    }

    pub fn track_store(&self) -> &Arc<dyn TrackStore> {
        &self.0.track_store
    }

    pub fn auth_service(&self) -> &AuthorizationService {
        &self.0.auth_service
    }

    pub fn alias_store(&self) -> &KeyAliasStore {
        &self.0.alias_store
    }

    pub fn packaging(&self) -> &PackagingCoordinator {
        &self.0.packaging
    }

    pub fn login_throttle(&self) -> &LoginThrottle {
        &self.0.login_throttle
    }

    pub fn reaper_cancel(&self) -> &CancellationToken {
        &self.0.reaper_cancel
    }

    /// Runs `f` on the bounded CPU-bound worker pool: the cipher,
    /// watermark, and packaging paths never block the async dispatcher.
    /// When the pool's queue is already full, returns [`ApiError::Busy`]
    /// immediately rather than queuing unboundedly.
    pub async fn run_cpu_bound<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .0
            .worker_permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| ApiError::Busy)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|_| ApiError::Transient("worker task panicked".into()))
    }
}
